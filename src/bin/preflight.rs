use anyhow::Context;
use module_cdn::infra::config::Config;
use module_cdn::DatabaseService;

const REQUIRED_TABLES: &[&str] = &["modules", "licenses", "module_metadata", "applications"];

fn usage_and_exit() -> ! {
    eprintln!(
        "Usage: cargo run --bin preflight\n\
         \n\
         Reads the same env vars as the server (a .env file is honoured):\n\
           DATABASE_URL, STORAGE_ROOT, BIND_ADDR, ADMIN_API_KEY, LICENSE_KEYS,\n\
           TOKEN_SWEEP_INTERVAL_SECS, MAX_LIVE_TOKENS, CORS_ORIGINS\n"
    );
    std::process::exit(2);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        usage_and_exit();
    }

    let cfg = Config::from_env().context("configuration is invalid")?;

    println!("> Preflight:");
    println!("  DATABASE_URL={}", cfg.database_url);
    println!("  STORAGE_ROOT={}", cfg.storage_root.display());
    println!("  BIND_ADDR={}", cfg.bind_addr);
    println!(
        "  ADMIN_API_KEY={}",
        if cfg.admin_api_key.is_some() { "<set>" } else { "<unset, admin routes open>" }
    );
    println!("  LICENSE_KEYS={} key(s)", cfg.license_keys.len());
    println!("  TOKEN_SWEEP_INTERVAL_SECS={}", cfg.token_sweep_interval.as_secs());
    println!("  MAX_LIVE_TOKENS={}", cfg.max_live_tokens);
    println!(
        "  CORS_ORIGINS={}",
        cfg.cors_origins.as_deref().unwrap_or("<any>")
    );

    // Connecting also creates any missing tables.
    let db = DatabaseService::connect(&cfg.database_url)
        .await
        .with_context(|| format!("cannot open database {}", cfg.database_url))?;
    db.ping().await.context("database ping failed")?;
    println!("  Database reachable.");

    for table in REQUIRED_TABLES {
        let found: Option<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(table)
                .fetch_optional(db.pool())
                .await?;
        if found.is_none() {
            return Err(anyhow::anyhow!("table `{}` is missing", table));
        }
    }
    println!("  Schema OK ({} tables).", REQUIRED_TABLES.len());

    let licenses = db.list_licenses().await?;
    let active = licenses.iter().filter(|l| l.active).count();
    println!("  Licenses: {} stored, {} active.", licenses.len(), active);
    let missing: Vec<&String> = cfg
        .license_keys
        .iter()
        .filter(|k| !licenses.iter().any(|l| &l.license_key == *k))
        .collect();
    if !missing.is_empty() {
        eprintln!(
            "  Warning: {} configured key(s) not seeded yet; the server seeds them on startup.",
            missing.len()
        );
    }

    // Storage root must accept writes.
    tokio::fs::create_dir_all(&cfg.storage_root)
        .await
        .with_context(|| format!("cannot create {}", cfg.storage_root.display()))?;
    let scratch = cfg.storage_root.join(".preflight-write-check");
    tokio::fs::write(&scratch, b"ok")
        .await
        .with_context(|| format!("storage root {} is not writable", cfg.storage_root.display()))?;
    tokio::fs::remove_file(&scratch).await?;
    println!("  Storage root is writable.");

    println!("> Preflight OK.");
    Ok(())
}
