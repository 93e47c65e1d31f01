//! Certificate settings that must agree with each other

use crate::envfile::EnvFile;

pub const CERT_EMAIL_VAR: &str = "EMAIL4CERTS";
pub const CERTS_DIR_VAR: &str = "CUSTOM_CERTS_DIR";
pub const UPDATE_CMD_VAR: &str = "UPDATE_CERTS_CMD";

/// `EMAIL4CERTS` sentinel selecting self-signed certificates
pub const INTERNAL_CERTS: &str = "internal";

pub const ACCEPTED_CERTS_DIRS: &[&str] = &["/etc/ssl/certs", "/usr/local/share/ca-certificates"];
pub const UPDATE_CMD_MARKER: &str = "update-ca-certificates";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SslFinding {
    pub name: String,
    pub message: String,
}

/// With internal certificates the CA bundle directory and refresh command
/// must point at the system trust store.
pub fn check(target: &EnvFile) -> Vec<SslFinding> {
    if setting(target, CERT_EMAIL_VAR) != INTERNAL_CERTS {
        return Vec::new();
    }

    let mut findings = Vec::new();

    let certs_dir = setting(target, CERTS_DIR_VAR);
    if !ACCEPTED_CERTS_DIRS.contains(&certs_dir) {
        findings.push(SslFinding {
            name: CERTS_DIR_VAR.to_string(),
            message: format!(
                "{CERT_EMAIL_VAR}='{INTERNAL_CERTS}' but {CERTS_DIR_VAR} is '{certs_dir}', should be '{}'",
                ACCEPTED_CERTS_DIRS.join("' or '")
            ),
        });
    }

    let update_cmd = setting(target, UPDATE_CMD_VAR);
    if !update_cmd.contains(UPDATE_CMD_MARKER) {
        findings.push(SslFinding {
            name: UPDATE_CMD_VAR.to_string(),
            message: format!(
                "{CERT_EMAIL_VAR}='{INTERNAL_CERTS}' but {UPDATE_CMD_VAR} is '{update_cmd}', should contain '{UPDATE_CMD_MARKER}'"
            ),
        });
    }

    if !findings.is_empty() {
        findings.insert(
            0,
            SslFinding {
                name: CERT_EMAIL_VAR.to_string(),
                message: format!(
                    "Set to '{INTERNAL_CERTS}' but certificate configuration is inconsistent"
                ),
            },
        );
    }

    findings
}

fn setting<'a>(target: &'a EnvFile, name: &str) -> &'a str {
    target.get(name).unwrap_or_default().trim()
}
