//! Standalone validator for the bot's environment configuration.
//!
//! Checks the environment (optionally loaded from a .env file) against
//! the same rules the bot applies at startup, without touching the
//! network. Useful before deploying a configuration change.

use std::process::ExitCode;

use clap::Parser;

use media_archive_bot::config::Settings;

/// Environment configuration validator.
#[derive(Parser, Debug)]
#[command(name = "validate_env")]
#[command(about = "Validates environment configuration for the archive bot")]
#[command(version)]
struct Args {
    /// Path to the .env file to load before validating.
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Also probe the temp root for writability.
    #[arg(short, long)]
    probe: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = dotenvy::from_filename(&args.env_file) {
        println!(
            "Note: could not load {} ({e}); validating the process environment only\n",
            args.env_file
        );
    }

    let settings = match Settings::from_env() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("✗ Configuration invalid: {e}");
            return ExitCode::FAILURE;
        }
    };

    println!("✓ Configuration is valid\n");
    println!("  Bot token:         {}", mask_token(&settings.bot_token));
    println!("  Allowed users:     {}", describe_allow_list(&settings));
    println!("  Temp root:         {}", settings.tmp_root.display());
    println!("  Archive name:      {}", settings.archive_name);
    println!("  Volume limit:      {} bytes", settings.archive_size_limit_bytes);
    println!("  Archive delay:     {:.1}s", settings.archive_delay.as_secs_f64());
    println!("  Download timeout:  {:.1}s", settings.download_timeout.as_secs_f64());

    if args.probe {
        return probe_tmp_root(&settings);
    }

    ExitCode::SUCCESS
}

fn describe_allow_list(settings: &Settings) -> String {
    if settings.allowed_users.is_empty() {
        "everyone (allow-list is empty!)".to_owned()
    } else {
        format!("{} user(s)", settings.allowed_users.len())
    }
}

fn probe_tmp_root(settings: &Settings) -> ExitCode {
    let probe = settings.tmp_root.join(".write_probe");
    let outcome = std::fs::create_dir_all(&settings.tmp_root)
        .and_then(|()| std::fs::write(&probe, b"probe"));

    match outcome {
        Ok(()) => {
            let _ = std::fs::remove_file(&probe);
            println!("\n✓ Temp root is writable");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("\n✗ Temp root is not writable: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Masks a bot token for display (keeps the numeric id, hides the secret).
fn mask_token(token: &str) -> String {
    match token.split_once(':') {
        Some((id, _)) => format!("{id}:***"),
        None => "***".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token("123456:AAH-secret-part"), "123456:***");
        assert_eq!(mask_token("no-colon-token"), "***");
    }
}
