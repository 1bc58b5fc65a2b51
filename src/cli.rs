use clap::Parser;
use std::path::PathBuf;

pub const MIN_REFRESH_MS: u64 = 1_000;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "kubeprompt",
    version,
    about = "Ask a Kubernetes cluster questions in plain language."
)]
pub struct CliArgs {
    /// Runtime config file (defaults to discovery via KUBEPROMPT_CONFIG, ./kubeprompt.yaml, ~/.config/kubeprompt)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Kubeconfig file to read instead of the default one
    #[arg(long)]
    pub kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use
    #[arg(long)]
    pub context: Option<String>,

    /// Gemini model name
    #[arg(long)]
    pub model: Option<String>,

    /// Home overview refresh interval in milliseconds
    #[arg(long, default_value_t = 5_000)]
    pub refresh_ms: u64,

    /// tracing filter (for example: info,debug,trace)
    #[arg(long, default_value = "info")]
    pub log_filter: String,

    /// Write logs to this file while the terminal UI is running
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Dispatch a single prompt, print the result and exit
    #[arg(short, long)]
    pub prompt: Option<String>,
}

impl CliArgs {
    pub fn refresh_interval_ms(&self) -> u64 {
        self.refresh_ms.max(MIN_REFRESH_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::CliArgs;
    use clap::Parser;

    #[test]
    fn refresh_interval_has_a_floor() {
        let args = CliArgs::parse_from(["kubeprompt", "--refresh-ms", "10"]);
        assert_eq!(args.refresh_interval_ms(), 1_000);
        assert_eq!(CliArgs::parse_from(["kubeprompt"]).refresh_interval_ms(), 5_000);
    }

    #[test]
    fn one_shot_prompt_is_optional() {
        let args = CliArgs::parse_from(["kubeprompt", "-p", "status of frontend"]);
        assert_eq!(args.prompt.as_deref(), Some("status of frontend"));
        assert!(CliArgs::parse_from(["kubeprompt"]).prompt.is_none());
    }
}
