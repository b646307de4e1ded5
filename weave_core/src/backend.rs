//! The external LLVM toolchain collaborator (spec section 6.3): a
//! `Backend` trait hiding `llc`/`clang` behind `(ir_text, output, opt_level)`,
//! and `ProcessBackend`, the shipped subprocess implementation. Neither this
//! module nor its caller links against LLVM; swapping toolchains is a matter
//! of pointing `ProcessBackend` at different program names.

use std::{
    error::Error,
    fmt::Display,
    fs,
    path::{Path, PathBuf},
    process::Command,
};

use log::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptLevel {
    O0,
    O2,
}

impl OptLevel {
    fn llc_flag(self) -> &'static str {
        match self {
            OptLevel::O0 => "-O0",
            OptLevel::O2 => "-O2",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError {
    pub message: String,
}

impl Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for BackendError {}

impl BackendError {
    fn new(message: impl Into<String>) -> Self {
        BackendError {
            message: message.into(),
        }
    }
}

pub trait Backend {
    /// Assembles `ir_text` and writes the result to `output`. What "the
    /// result" means depends on how the backend was configured: an object
    /// file for `-c`, or a linked executable otherwise.
    fn assemble(&self, ir_text: &str, output: &Path, opt_level: OptLevel) -> Result<(), BackendError>;
}

/// Shells out to a configured `llc`/`clang` pair. `object_only` mirrors the
/// CLI's `-c`; when false, `assemble` also links, pulling in `runtime` and
/// honoring `static_link` the way `--static`/`--runtime`/`WEAVE_RUNTIME` ask.
pub struct ProcessBackend {
    pub llc: String,
    pub clang: String,
    pub object_only: bool,
    pub static_link: bool,
    pub runtime: Option<PathBuf>,
}

impl ProcessBackend {
    pub fn new(object_only: bool, static_link: bool, runtime: Option<PathBuf>) -> Self {
        ProcessBackend {
            llc: "llc".to_string(),
            clang: "clang".to_string(),
            object_only,
            static_link,
            runtime,
        }
    }

    fn run(&self, mut command: Command, step: &str) -> Result<(), BackendError> {
        let output = command
            .output()
            .map_err(|e| BackendError::new(format!("failed to invoke {step}: {e}")))?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.is_empty() {
            error!("{stderr}");
        }
        if !output.status.success() {
            return Err(BackendError::new(format!(
                "{step} exited with status {}",
                output.status
            )));
        }
        Ok(())
    }
}

impl Backend for ProcessBackend {
    fn assemble(&self, ir_text: &str, output: &Path, opt_level: OptLevel) -> Result<(), BackendError> {
        let ir_path = output.with_extension("ll");
        fs::write(&ir_path, ir_text)
            .map_err(|e| BackendError::new(format!("failed to write {}: {e}", ir_path.display())))?;

        let object_path = output.with_extension("o");
        info!("Assembling '{}'...", ir_path.display());
        let mut llc = Command::new(&self.llc);
        llc.args([
            "-filetype=obj",
            opt_level.llc_flag(),
            "-o",
            &object_path.to_string_lossy(),
            &ir_path.to_string_lossy(),
        ]);
        self.run(llc, "llc")?;

        if self.object_only {
            fs::rename(&object_path, output)
                .map_err(|e| BackendError::new(format!("failed to move object file: {e}")))?;
            return Ok(());
        }

        info!("Linking '{}'...", output.display());
        let mut args = vec!["-o".to_string(), output.to_string_lossy().to_string()];
        args.push(object_path.to_string_lossy().to_string());
        if self.static_link {
            args.push("-static".to_string());
        }
        if let Some(runtime) = &self.runtime {
            args.push(runtime.to_string_lossy().to_string());
        }
        let mut clang = Command::new(&self.clang);
        clang.args(args.as_slice());
        self.run(clang, "clang")?;

        let _ = fs::remove_file(&object_path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opt_level_maps_to_llc_flags() {
        assert_eq!(OptLevel::O0.llc_flag(), "-O0");
        assert_eq!(OptLevel::O2.llc_flag(), "-O2");
    }

    #[test]
    fn object_only_backend_is_configured_without_a_runtime() {
        let backend = ProcessBackend::new(true, false, None);
        assert!(backend.object_only);
        assert!(backend.runtime.is_none());
    }
}
