use std::path::PathBuf;

/// Flag lookup over a captured argument list. Accepts both `--name value` and `--name=value`.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    args: Vec<String>,
}

impl CliArgs {
    pub fn from_env() -> Self {
        Self::new(std::env::args().skip(1).collect())
    }

    pub fn new(args: Vec<String>) -> Self {
        Self { args }
    }

    /// First positional argument (the subcommand).
    pub fn command(&self) -> Option<&str> {
        self.args
            .first()
            .map(String::as_str)
            .filter(|a| !a.starts_with("--"))
    }

    pub fn value(&self, name: &str) -> Option<String> {
        let prefix = format!("{name}=");
        for (idx, arg) in self.args.iter().enumerate() {
            if let Some(raw) = arg.strip_prefix(&prefix) {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            }
            if arg == name
                && let Some(next) = self.args.get(idx + 1)
                && !next.trim().is_empty()
            {
                return Some(next.trim().to_string());
            }
        }
        None
    }

    pub fn f64(&self, name: &str) -> Option<f64> {
        self.value(name).and_then(|v| v.parse::<f64>().ok())
    }

    pub fn usize(&self, name: &str) -> Option<usize> {
        self.value(name).and_then(|v| v.parse::<usize>().ok())
    }

    pub fn path(&self, name: &str) -> Option<PathBuf> {
        self.value(name).map(PathBuf::from)
    }

    pub fn f64_list(&self, name: &str) -> Option<Vec<f64>> {
        let values = parse_f64_list(&self.value(name)?);
        (!values.is_empty()).then_some(values)
    }

    pub fn usize_list(&self, name: &str) -> Option<Vec<usize>> {
        let values = parse_usize_list(&self.value(name)?);
        (!values.is_empty()).then_some(values)
    }

    pub fn has_flag(&self, name: &str) -> bool {
        self.args.iter().any(|arg| arg == name)
    }
}

pub fn parse_f64_list(raw: &str) -> Vec<f64> {
    raw.split([',', ';', ' '])
        .filter_map(|part| part.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .collect()
}

pub fn parse_usize_list(raw: &str) -> Vec<usize> {
    raw.split([',', ';', ' '])
        .filter_map(|part| part.trim().parse::<usize>().ok())
        .collect()
}

pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}
