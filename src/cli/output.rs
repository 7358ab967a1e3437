//! Colored terminal output helpers.
//!
//! All user-facing output goes through these functions so we get
//! consistent styling across every command.

use base64::Engine;
use comfy_table::{ContentArrangement, Table};
use console::style;

use crate::sync::{SyncReport, SyncStatus};
use crate::vault::{Secret, SecretMetadata, SecretPayload};

/// Print a green success message: "check_mark {msg}"
pub fn success(msg: &str) {
    println!("{} {}", style("\u{2713}").green().bold(), msg);
}

/// Print a red error message: "x_mark {msg}"
pub fn error(msg: &str) {
    eprintln!("{} {}", style("\u{2717}").red().bold(), msg);
}

/// Print a yellow warning: "warning_sign {msg}"
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("\u{26a0}").yellow().bold(), msg);
}

/// Print a blue info message: "info_sign {msg}"
pub fn info(msg: &str) {
    println!("{} {}", style("\u{2139}").blue().bold(), msg);
}

/// Print a dim tip/hint: "arrow {msg}"
pub fn tip(msg: &str) {
    println!("{} {}", style("\u{2192}").dim(), style(msg).dim());
}

/// Print a table of secret metadata (Name, Type, Updated).
pub fn print_secrets_table(secrets: &[SecretMetadata]) {
    if secrets.is_empty() {
        info("No secrets in this vault yet.");
        tip("Run `vaultsync add text <NAME>` to add your first secret.");
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Name", "Type", "Updated"]);

    for s in secrets {
        table.add_row(vec![
            s.name.clone(),
            s.secret_type.to_string(),
            s.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ]);
    }

    println!("{table}");
}

fn mask(value: &str) -> String {
    "*".repeat(value.chars().count().clamp(4, 12))
}

/// Field/value rows for a secret; sensitive fields masked unless `reveal`.
pub fn secret_fields(secret: &Secret, reveal: bool) -> Vec<(String, String)> {
    let hide = |v: &str| if reveal { v.to_string() } else { mask(v) };
    let mut rows = match &secret.payload {
        SecretPayload::BankCard(card) => vec![
            ("number".to_string(), hide(&card.number)),
            ("holder".to_string(), card.holder.clone()),
            ("expires".to_string(), card.expires.clone()),
            ("cvv".to_string(), hide(&card.cvv)),
        ],
        SecretPayload::Binary(blob) => {
            let data = if reveal {
                base64::engine::general_purpose::STANDARD.encode(&blob.data)
            } else {
                format!("{} bytes", blob.data.len())
            };
            vec![("data".to_string(), data)]
        }
        SecretPayload::Text(note) => vec![("content".to_string(), hide(&note.content))],
        SecretPayload::UsernamePassword(creds) => vec![
            ("username".to_string(), creds.username.clone()),
            ("password".to_string(), hide(&creds.password)),
        ],
    };
    for (key, value) in &secret.meta {
        rows.push((format!("meta.{key}"), value.clone()));
    }
    rows
}

/// Print one secret as a two-column table.
pub fn print_secret(secret: &Secret, reveal: bool) {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Field", "Value"]);
    table.add_row(vec!["name".to_string(), secret.name.clone()]);
    table.add_row(vec!["type".to_string(), secret.secret_type().to_string()]);
    for (field, value) in secret_fields(secret, reveal) {
        table.add_row(vec![field, value]);
    }
    table.add_row(vec![
        "updated".to_string(),
        secret.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
    ]);
    println!("{table}");
}

/// Print per-type counts and every failure of a sync or download run.
pub fn print_sync_report(report: &SyncReport) {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Type", "Applied", "Failed", "Last processed"]);
    for t in &report.types {
        let applied = if t.applied.is_empty() {
            "-".to_string()
        } else {
            t.applied
                .iter()
                .map(|(name, action)| format!("{name} ({action})"))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let last = match (&t.last_processed, t.interrupted) {
            (Some(name), true) => format!("{name} (interrupted)"),
            (None, true) => "(interrupted)".to_string(),
            (Some(name), false) => name.clone(),
            (None, false) => "-".to_string(),
        };
        table.add_row(vec![
            t.secret_type.to_string(),
            applied,
            t.failed.len().to_string(),
            last,
        ]);
    }
    println!("{table}");

    if let SyncStatus::Failed { interrupted, .. } = report.status() {
        for t in &report.types {
            for f in &t.failed {
                warning(&format!(
                    "{}/{} failed ({}): {}",
                    t.secret_type, f.name, f.kind, f.message
                ));
            }
        }
        if interrupted {
            warning("Run was cancelled; items already applied were kept.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::{Credentials, SecretPayload};

    fn creds() -> Secret {
        Secret::new(
            "mail",
            SecretPayload::UsernamePassword(Credentials {
                username: "alice".into(),
                password: "hunter2".into(),
            }),
        )
    }

    #[test]
    fn fields_are_masked_by_default() {
        let rows = secret_fields(&creds(), false);
        assert!(rows.iter().any(|(_, v)| v == "alice"));
        assert!(!rows.iter().any(|(_, v)| v.contains("hunter2")));
    }

    #[test]
    fn reveal_shows_fields() {
        let rows = secret_fields(&creds(), true);
        assert!(rows.iter().any(|(k, v)| k == "password" && v == "hunter2"));
    }

    #[test]
    fn meta_is_listed() {
        let mut secret = creds();
        secret.meta.insert("site".into(), "mail.example".into());
        let rows = secret_fields(&secret, false);
        assert!(rows.iter().any(|(k, _)| k == "meta.site"));
    }
}
