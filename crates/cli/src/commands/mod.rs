use chrono::{DateTime, Utc};
use clap::Subcommand;
use rolegate_core::{Role, UserId};

mod execute;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check a single permission
    Check {
        user_id: UserId,
        permission: String,

        /// Apply the failure policy and print only true or false
        #[arg(long)]
        gate: bool,
    },

    /// Check several permissions at once
    #[command(name = "bulk-check")]
    BulkCheck {
        user_id: UserId,

        #[arg(required = true)]
        permissions: Vec<String>,

        /// Require every permission instead of any
        #[arg(long)]
        all: bool,
    },

    /// Change a user's custom, temporary and denied permissions
    Update {
        user_id: UserId,

        /// Grant a custom permission (repeatable)
        #[arg(long, value_name = "PERMISSION")]
        add: Vec<String>,

        /// Remove a custom or direct permission (repeatable)
        #[arg(long, value_name = "PERMISSION")]
        remove: Vec<String>,

        /// Grant a temporary permission as PERMISSION=RFC3339 (repeatable)
        #[arg(long = "add-temporary", value_name = "PERMISSION=EXPIRY", value_parser = parse_temporary)]
        add_temporary: Vec<(String, DateTime<Utc>)>,

        /// Revoke a temporary permission (repeatable)
        #[arg(long = "remove-temporary", value_name = "PERMISSION")]
        remove_temporary: Vec<String>,

        /// Block a permission (repeatable)
        #[arg(long, value_name = "PERMISSION")]
        deny: Vec<String>,

        /// Lift a block (repeatable)
        #[arg(long, value_name = "PERMISSION")]
        allow: Vec<String>,

        /// Fail unless the stored record is at this version
        #[arg(long, value_name = "VERSION")]
        expected_version: Option<u64>,
    },

    /// Apply a permission template to a user's direct grants
    Template {
        user_id: UserId,
        template: String,

        /// Replace direct grants instead of merging into them
        #[arg(long)]
        replace: bool,
    },

    /// Audit a user's cached permissions
    Audit { user_id: UserId },

    /// Re-derive role permissions after a role change
    #[command(name = "sync-role")]
    SyncRole { user_id: UserId, role: Role },

    /// Drop cached records
    Invalidate {
        #[arg(required = true)]
        user_ids: Vec<UserId>,
    },

    /// List effective permissions of the cached record
    Effective { user_id: UserId },

    /// Show a user's record and cache metadata
    Show {
        user_id: UserId,

        /// Discard the cached record and rebuild it from role defaults first
        #[arg(long)]
        refresh: bool,
    },

    /// Describe a permission, or list the catalog
    Describe { permission: Option<String> },
}

fn parse_temporary(raw: &str) -> Result<(String, DateTime<Utc>), String> {
    let (permission, expiry) = raw
        .rsplit_once('=')
        .ok_or_else(|| format!("expected PERMISSION=EXPIRY, got '{raw}'"))?;
    let expires_at = DateTime::parse_from_rfc3339(expiry.trim())
        .map_err(|e| format!("invalid expiry '{expiry}': {e}"))?
        .with_timezone(&Utc);
    Ok((permission.to_string(), expires_at))
}
