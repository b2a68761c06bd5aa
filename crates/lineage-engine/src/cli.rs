use anyhow::Result;
use lineage_core::{LineageDirection, Urn};
use lineage_engine::export::ExportFormat;
use lineage_engine::graph::layout::LayoutDirection;
use lineage_engine::util::config::ViewerConfig;
use std::ffi::OsString;
use std::path::PathBuf;

pub const USAGE: &str = "\
usage: lineage-inspect [options]

  --base-url URL          lineage API base url
  --scope NAME            summary scope
  --data-source ID        restrict the summary to one data source
  --limit N               node limit for summary/drill/impacts
  --drill URN             show the ring around URN instead of the summary
  --depth N               drill depth
  --direction DIR         drill direction: upstream|downstream|both
  --impacts URN           show downstream impact of URN
  --radius N              impact radius
  --provenance URN        show upstream ancestry of URN
  --trace EDGE_ID         also fetch row-level evidence for an edge
  --search TEXT           search the snapshot and report the first hit
  --layout TB|LR          layout direction
  --format json|dot       export format (default json)
  --output PATH           write the export to PATH instead of stdout
  --timeout SECS          how long to wait for the backend
  --save-config           persist the effective settings
  -h, --help              print this help
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Summary,
    Drill(Urn),
    Impacts(Urn),
    Provenance(Urn),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InspectArgs {
    pub target: Target,
    pub base_url: Option<String>,
    pub scope: Option<String>,
    pub data_source: Option<String>,
    pub limit: Option<u32>,
    pub depth: Option<u32>,
    pub direction: Option<LineageDirection>,
    pub radius: Option<u32>,
    pub layout: Option<LayoutDirection>,
    pub timeout_secs: Option<u64>,
    pub trace: Option<String>,
    pub search: Option<String>,
    pub format: ExportFormat,
    pub output: Option<PathBuf>,
    pub save_config: bool,
    pub help: bool,
}

impl Default for InspectArgs {
    fn default() -> Self {
        Self {
            target: Target::Summary,
            base_url: None,
            scope: None,
            data_source: None,
            limit: None,
            depth: None,
            direction: None,
            radius: None,
            layout: None,
            timeout_secs: None,
            trace: None,
            search: None,
            format: ExportFormat::Json,
            output: None,
            save_config: false,
            help: false,
        }
    }
}

impl InspectArgs {
    /// Flags override whatever the config file said.
    pub fn apply_to(&self, cfg: &mut ViewerConfig) {
        if let Some(url) = &self.base_url {
            cfg.backend_url = url.clone();
        }
        if let Some(scope) = &self.scope {
            cfg.scope = scope.clone();
        }
        if let Some(ds) = &self.data_source {
            cfg.data_source_id = Some(ds.clone());
        }
        if let Some(limit) = self.limit {
            cfg.summary_limit = limit;
            cfg.drill_limit = limit;
            cfg.impact_limit = limit;
        }
        if let Some(depth) = self.depth {
            cfg.drill_depth = depth;
        }
        if let Some(direction) = self.direction {
            cfg.drill_direction = direction;
        }
        if let Some(radius) = self.radius {
            cfg.impact_radius = radius;
        }
        if let Some(layout) = self.layout {
            cfg.direction = layout;
        }
        if let Some(secs) = self.timeout_secs {
            cfg.query_timeout_secs = secs;
        }
    }
}

fn parse_direction(input: &str) -> Result<LineageDirection> {
    match input.trim().to_ascii_lowercase().as_str() {
        "upstream" | "up" => Ok(LineageDirection::Upstream),
        "downstream" | "down" => Ok(LineageDirection::Downstream),
        "both" => Ok(LineageDirection::Both),
        _ => anyhow::bail!("invalid direction: {input} (expected upstream|downstream|both)"),
    }
}

fn parse_num<T: std::str::FromStr>(flag: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| anyhow::anyhow!("{flag} expects a number, got {value:?}"))
}

pub fn parse_args() -> Result<InspectArgs> {
    parse_args_from(std::env::args_os().skip(1))
}

pub fn parse_args_from<I>(args: I) -> Result<InspectArgs>
where
    I: IntoIterator<Item = OsString>,
{
    let mut out = InspectArgs::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        let flag = arg.to_string_lossy().into_owned();
        if flag == "-h" || flag == "--help" {
            out.help = true;
            continue;
        }
        if flag == "--save-config" {
            out.save_config = true;
            continue;
        }

        let Some(value) = args.next() else {
            anyhow::bail!("{flag} expects a value");
        };
        let value = value.to_string_lossy().into_owned();
        match flag.as_str() {
            "--base-url" => out.base_url = Some(value),
            "--scope" => out.scope = Some(value),
            "--data-source" => out.data_source = Some(value),
            "--limit" => out.limit = Some(parse_num(&flag, &value)?),
            "--depth" => out.depth = Some(parse_num(&flag, &value)?),
            "--radius" => out.radius = Some(parse_num(&flag, &value)?),
            "--timeout" => out.timeout_secs = Some(parse_num(&flag, &value)?),
            "--direction" => out.direction = Some(parse_direction(&value)?),
            "--layout" => out.layout = Some(LayoutDirection::parse(&value)?),
            "--format" => out.format = ExportFormat::parse(&value)?,
            "--output" => out.output = Some(PathBuf::from(value)),
            "--trace" => out.trace = Some(value),
            "--search" => out.search = Some(value),
            "--drill" | "--impacts" | "--provenance" => {
                if out.target != Target::Summary {
                    anyhow::bail!("only one of --drill, --impacts, --provenance may be given");
                }
                let urn = Urn::new(value);
                out.target = match flag.as_str() {
                    "--drill" => Target::Drill(urn),
                    "--impacts" => Target::Impacts(urn),
                    _ => Target::Provenance(urn),
                };
            }
            _ => anyhow::bail!("unknown argument: {:?}", arg),
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<OsString> {
        list.iter().map(OsString::from).collect()
    }

    #[test]
    fn parses_drill_with_overrides() {
        let parsed = parse_args_from(args(&[
            "--drill",
            "db.orders",
            "--depth",
            "3",
            "--direction",
            "upstream",
            "--layout",
            "lr",
            "--format",
            "dot",
        ]))
        .expect("args parsed");

        assert_eq!(parsed.target, Target::Drill(Urn::from("db.orders")));
        assert_eq!(parsed.depth, Some(3));
        assert_eq!(parsed.direction, Some(LineageDirection::Upstream));
        assert_eq!(parsed.layout, Some(LayoutDirection::LeftRight));
        assert_eq!(parsed.format, ExportFormat::Dot);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_args_from(args(&["--limit", "many"])).is_err());
        assert!(parse_args_from(args(&["--scope"])).is_err());
        assert!(parse_args_from(args(&["--bogus", "1"])).is_err());
        assert!(parse_args_from(args(&["--drill", "a", "--impacts", "b"])).is_err());
    }

    #[test]
    fn flags_override_config() {
        let parsed = parse_args_from(args(&[
            "--scope",
            "warehouse",
            "--limit",
            "50",
            "--save-config",
        ]))
        .expect("args parsed");
        assert!(parsed.save_config);

        let mut cfg = ViewerConfig::default();
        parsed.apply_to(&mut cfg);
        assert_eq!(cfg.scope, "warehouse");
        assert_eq!(cfg.summary_limit, 50);
        assert_eq!(cfg.drill_limit, 50);
        assert_eq!(cfg.backend_url, ViewerConfig::default().backend_url);
    }
}
