use crate::middleware::rbac::Role;
use crate::models::Variant;
use crate::workflow::gate::AuthorizationGate;

const PLACEHOLDER_SECRET: &str = "CHANGE_ME_DEV_ONLY_SECRET";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// Set via MNE_STORE (`postgres` | `memory`). Default: postgres.
    pub store: StoreBackend,
    /// HS256 secret used to validate bearer tokens.
    pub jwt_secret: String,
    /// Roles allowed to approve or reject. Set via MNE_APPROVER_ROLES
    /// (comma-separated). Default: Admin, Program Manager, M&E Officer.
    pub approver_roles: Vec<Role>,
    /// Variants served over HTTP. Set via MNE_ENABLED_VARIANTS.
    /// Default: beneficiary, program.
    pub enabled_variants: Vec<Variant>,
    pub dashboard_origin: String,
}

impl Config {
    pub fn variant_enabled(&self, variant: Variant) -> bool {
        self.enabled_variants.contains(&variant)
    }
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let jwt_secret =
        std::env::var("MNE_JWT_SECRET").unwrap_or_else(|_| PLACEHOLDER_SECRET.into());

    if jwt_secret == PLACEHOLDER_SECRET {
        let env_mode = std::env::var("MNE_ENV")
            .or_else(|_| std::env::var("RUST_ENV"))
            .unwrap_or_default();
        if env_mode == "production" {
            anyhow::bail!(
                "MNE_JWT_SECRET is still the insecure placeholder. \
                 Set a proper secret before running in production."
            );
        }
        eprintln!("⚠️  MNE_JWT_SECRET is not set; using insecure placeholder. Set a real secret for production.");
    }

    let store = match std::env::var("MNE_STORE")
        .unwrap_or_else(|_| "postgres".into())
        .to_lowercase()
        .as_str()
    {
        "postgres" | "pg" => StoreBackend::Postgres,
        "memory" | "mem" => StoreBackend::Memory,
        other => anyhow::bail!("invalid MNE_STORE '{}': expected 'postgres' or 'memory'", other),
    };

    let approver_roles = match std::env::var("MNE_APPROVER_ROLES") {
        Ok(raw) => parse_roles(&raw),
        Err(_) => AuthorizationGate::default_approvers(),
    };
    if approver_roles.is_empty() {
        anyhow::bail!("MNE_APPROVER_ROLES is set but names no roles");
    }

    let enabled_variants = match std::env::var("MNE_ENABLED_VARIANTS") {
        Ok(raw) => parse_variants(&raw)?,
        Err(_) => vec![Variant::Beneficiary, Variant::Program],
    };

    Ok(Config {
        port: std::env::var("MNE_PORT")
            .unwrap_or_else(|_| "8080".into())
            .parse()
            .unwrap_or(8080),
        database_url: std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/mne".into()),
        store,
        jwt_secret,
        approver_roles,
        enabled_variants,
        dashboard_origin: std::env::var("DASHBOARD_ORIGIN")
            .unwrap_or_else(|_| "http://localhost:3000".into()),
    })
}

pub fn parse_roles(raw: &str) -> Vec<Role> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Role::parse)
        .collect()
}

pub fn parse_variants(raw: &str) -> anyhow::Result<Vec<Variant>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<Variant>().map_err(anyhow::Error::msg))
        .collect()
}
