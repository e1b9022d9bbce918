use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty. Returns true if the help was printed.
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 17] = [
        "RUST_LOG",
        "LQK_HOST",
        "LQK_PORT",
        "LQK_DATABASE_URL",
        "LQK_PUBLIC_URL",
        "LQK_SESSION_DURATION_HOURS",
        "LQK_UPLOAD_DIR",
        "LQK_PAYMENT_TRACKING_INTERVAL_HOURS",
        "LQK_EMAIL_SERVICE",
        "LQK_EMAIL_FROM",
        "LQK_SMTP_HOST",
        "LQK_SMTP_PORT",
        "LQK_SMTP_USER",
        "LQK_USE_X_FORWARDED_FOR",
        "LQK_USE_FORWARDED",
        "LQK_JWT_SECRET",
        "LQK_SMTP_PASSWORD",
    ];

    const SECRET_ENVS: [&str; 2] = ["LQK_JWT_SECRET", "LQK_SMTP_PASSWORD"];

    println!("Current environment values (secrets are only reported as set or not):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(_) if SECRET_ENVS.contains(&name) => "Set (hidden)".into(),
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
