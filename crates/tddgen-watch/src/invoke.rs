//! Running the injector as a separate process

use anyhow::{Context, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tddgen_core::{exit_code, FieldValues};

/// Outcome of one injector run, classified by exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeStatus {
    Success,
    /// Might succeed on another attempt. `None` when killed by a signal.
    Retryable(Option<i32>),
    /// Same inputs will fail again
    Permanent(i32),
}

impl InvokeStatus {
    pub fn from_code(code: Option<i32>) -> Self {
        match code {
            Some(exit_code::SUCCESS) => Self::Success,
            Some(exit_code::PERMANENT) => Self::Permanent(exit_code::PERMANENT),
            other => Self::Retryable(other),
        }
    }
}

/// Something that turns a field value set into an output document.
pub trait Injector {
    /// `source` is the document the values were extracted from; its file
    /// stem names the output when the values carry no identifier.
    ///
    /// Errors mean the injector could not be run at all.
    fn invoke(&self, values: &FieldValues, source: &Path) -> Result<InvokeStatus>;
}

/// Runs the `tddgen` binary with one `--<field>=<value>` argument per field.
pub struct ProcessInjector {
    binary: PathBuf,
    config: PathBuf,
}

impl ProcessInjector {
    pub fn new(binary: PathBuf, config: PathBuf) -> Self {
        Self { binary, config }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn command(&self, values: &FieldValues, source: &Path) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--config").arg(&self.config).arg("--quiet");
        if let Some(stem) = source.file_stem() {
            let mut arg = OsString::from("--fallback-name=");
            arg.push(stem);
            cmd.arg(arg);
        }
        for (name, value) in values.iter() {
            // `=` keeps values starting with '-' from reading as flags
            cmd.arg(format!("--{name}={value}"));
        }
        // stdin is closed so a missing field fails instead of prompting
        cmd.stdin(Stdio::null());
        cmd
    }
}

impl Injector for ProcessInjector {
    fn invoke(&self, values: &FieldValues, source: &Path) -> Result<InvokeStatus> {
        let status = self
            .command(values, source)
            .status()
            .with_context(|| format!("Failed to start {}", self.binary.display()))?;
        Ok(InvokeStatus::from_code(status.code()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_code() {
        assert_eq!(InvokeStatus::from_code(Some(0)), InvokeStatus::Success);
        assert_eq!(InvokeStatus::from_code(Some(2)), InvokeStatus::Permanent(2));
        assert_eq!(
            InvokeStatus::from_code(Some(1)),
            InvokeStatus::Retryable(Some(1))
        );
        assert_eq!(
            InvokeStatus::from_code(Some(101)),
            InvokeStatus::Retryable(Some(101))
        );
        assert_eq!(InvokeStatus::from_code(None), InvokeStatus::Retryable(None));
    }

    #[test]
    fn test_command_arguments() {
        let injector = ProcessInjector::new(PathBuf::from("tddgen"), PathBuf::from("/etc/.config"));
        let values: FieldValues = [("re", "John Smith"), ("wo", "-12")].into_iter().collect();
        let cmd = injector.command(&values, Path::new("/srv/intake/scan 0042.pdf"));

        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "--config",
                "/etc/.config",
                "--quiet",
                "--fallback-name=scan 0042",
                "--re=John Smith",
                "--wo=-12"
            ]
        );
    }

    #[test]
    fn test_command_without_source_stem() {
        let injector = ProcessInjector::new(PathBuf::from("tddgen"), PathBuf::from(".config"));
        let values: FieldValues = [("re", "")].into_iter().collect();
        let cmd = injector.command(&values, Path::new("/"));

        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args, vec!["--config", ".config", "--quiet", "--re="]);
    }

    #[test]
    fn test_missing_binary_is_an_error() {
        let injector = ProcessInjector::new(
            PathBuf::from("/nonexistent/tddgen"),
            PathBuf::from(".config"),
        );
        assert!(injector
            .invoke(&FieldValues::new(), Path::new("intake.pdf"))
            .is_err());
    }
}
