//! Repair artifacts: a plan frozen to an executable file
//!
//! An artifact is a TOML document whose first line is a shebang pointing at
//! the webperm binary's `replay` command. TOML reads the shebang as a
//! comment, so the same file is both runnable and parseable:
//!
//! ```text
//! #!/usr/local/bin/webperm replay
//! # webperm repair artifact. Re-applies ownership, modes and ACLs from scratch.
//! # plan-sha256:3f2a...
//!
//! version = 1
//!
//! [params]
//! document_root = "/home/shop/public_html"
//! ...
//! ```
//!
//! Every path and identity is a literal in the embedded plan. Replay
//! re-checks accounts and groups live before executing it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use webperm_fs::{PermissionOps, compute_content_checksum};

use crate::model::ARTIFACT_MODE;
use crate::plan::{Plan, PlanParams, Step};
use crate::reconcile::{ReconcileOptions, ReconcileReport, Reconciler};
use crate::{Error, Result};

/// Artifact format version written by this build.
pub const ARTIFACT_VERSION: u32 = 1;

const FINGERPRINT_TAG: &str = "# plan-sha256:";
const BANNER: &str =
    "# webperm repair artifact. Re-applies ownership, modes and ACLs from scratch.";

#[derive(Debug, Serialize, Deserialize)]
struct Document {
    version: u32,
    params: PlanParams,
    steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
struct VersionProbe {
    version: Option<u32>,
}

/// A parsed repair artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub plan: Plan,
    /// Interpreter named by the shebang line, if any
    pub interpreter: Option<PathBuf>,
    /// Fingerprint recorded in the header, without the `sha256:` prefix
    pub recorded_fingerprint: Option<String>,
    /// Fingerprint of the body as read
    pub actual_fingerprint: String,
}

impl Artifact {
    /// Render `plan` as artifact text run by `interpreter`.
    ///
    /// Identical plans render to identical bytes.
    pub fn render(plan: &Plan, interpreter: &Path) -> Result<String> {
        let shebang = interpreter.to_string_lossy();
        if shebang.is_empty() || shebang.chars().any(char::is_whitespace) {
            return Err(Error::ArtifactFormat {
                message: format!("interpreter path '{}' cannot be used in a shebang", shebang),
            });
        }

        let body = toml::to_string(&Document {
            version: ARTIFACT_VERSION,
            params: plan.params.clone(),
            steps: plan.steps.clone(),
        })?;

        Ok(format!(
            "#!{shebang} replay\n{BANNER}\n{FINGERPRINT_TAG}{}\n\n{body}",
            fingerprint(&body)
        ))
    }

    /// Parse artifact text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ArtifactFormat`] when the version is missing or not
    /// understood, and [`Error::TomlDe`] when the body is malformed.
    pub fn parse(text: &str) -> Result<Self> {
        let mut interpreter = None;
        let mut recorded_fingerprint = None;
        let mut offset = 0;

        for line in text.split_inclusive('\n') {
            let trimmed = line.trim();
            if !(trimmed.is_empty() || trimmed.starts_with('#')) {
                break;
            }
            if let Some(rest) = trimmed.strip_prefix("#!") {
                if offset == 0 {
                    interpreter = rest.split_whitespace().next().map(PathBuf::from);
                }
            } else if let Some(hex) = trimmed.strip_prefix(FINGERPRINT_TAG) {
                recorded_fingerprint = Some(hex.trim().to_string());
            }
            offset += line.len();
        }

        let body = &text[offset..];
        let probe: VersionProbe = toml::from_str(body)?;
        match probe.version {
            Some(ARTIFACT_VERSION) => {}
            Some(other) => {
                return Err(Error::ArtifactFormat {
                    message: format!(
                        "unsupported version {other} (this build reads version {ARTIFACT_VERSION})"
                    ),
                });
            }
            None => {
                return Err(Error::ArtifactFormat {
                    message: "missing version".into(),
                });
            }
        }

        let document: Document = toml::from_str(body)?;
        Ok(Self {
            plan: Plan {
                params: document.params,
                steps: document.steps,
            },
            interpreter,
            recorded_fingerprint,
            actual_fingerprint: fingerprint(body),
        })
    }

    /// Whether the body still matches the fingerprint in its header.
    pub fn fingerprint_matches(&self) -> bool {
        self.recorded_fingerprint.as_deref() == Some(self.actual_fingerprint.as_str())
    }
}

fn fingerprint(body: &str) -> String {
    compute_content_checksum(body)
        .trim_start_matches("sha256:")
        .to_string()
}

/// Writes repair artifacts through a [`PermissionOps`] backend.
pub struct ArtifactGenerator<'a, O: PermissionOps + ?Sized> {
    ops: &'a O,
}

impl<'a, O: PermissionOps + ?Sized> ArtifactGenerator<'a, O> {
    pub fn new(ops: &'a O) -> Self {
        Self { ops }
    }

    /// Write the artifact for `plan` to its configured path.
    ///
    /// The file is owned by the code owner and shared group with mode
    /// `0750`. Returns the artifact path.
    pub fn generate(&self, plan: &Plan, interpreter: &Path) -> Result<PathBuf> {
        let text = Artifact::render(plan, interpreter)?;
        let params = &plan.params;
        let changed = self.ops.write_file(
            &params.artifact_path,
            text.as_bytes(),
            &params.code_owner,
            &params.shared_group,
            ARTIFACT_MODE,
        )?;
        info!(
            path = %params.artifact_path.display(),
            changed,
            "repair artifact written"
        );
        Ok(params.artifact_path.clone())
    }
}

/// Run the plan embedded in the artifact at `path`.
///
/// Preconditions are re-checked against live account and group state. A
/// fingerprint mismatch is logged and the artifact still runs.
pub fn replay<O: PermissionOps + ?Sized>(
    ops: &O,
    path: &Path,
    options: &ReconcileOptions,
) -> Result<ReconcileReport> {
    let bytes = ops.read_file(path)?;
    let text = String::from_utf8(bytes).map_err(|e| Error::ArtifactFormat {
        message: format!("{} is not UTF-8: {e}", path.display()),
    })?;
    let artifact = Artifact::parse(&text)?;
    if !artifact.fingerprint_matches() {
        warn!(
            path = %path.display(),
            "artifact body does not match its plan-sha256 header; it was edited by hand"
        );
    }
    info!(path = %path.display(), steps = artifact.plan.steps.len(), "replaying artifact");
    Reconciler::new(ops).run(&artifact.plan, options)
}
