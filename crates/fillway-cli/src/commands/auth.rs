//! Authentication commands.

use crate::context::AppContext;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use auth_engine::AuthSession;

/// Sign in through the browser.
pub async fn login(context: &AppContext, format: &OutputFormat) -> Result<()> {
    let mut session = context.auth_session();

    if session.validate_session().await {
        output::print_success(
            &format!("Already signed in as {}", display_name(&session)),
            format,
        );
        return Ok(());
    }

    session.on_auth_url(|url| {
        println!("Opening your browser to sign in.");
        println!("If it does not open, visit: {}", url);
        println!("(The URL has been copied to your clipboard.)");
    });

    println!("Signing in...");

    match session.sign_in().await {
        Ok(()) if session.is_signed_in() => {
            output::print_success(
                &format!("Signed in as {}", display_name(&session)),
                format,
            );
        }
        Ok(()) => {
            output::print_error("Sign-in did not complete", format);
        }
        Err(e) => {
            output::print_error(&format!("Sign-in failed: {}", e), format);
            eprintln!("See {} for details.", context.paths.log_file().display());
        }
    }

    Ok(())
}

/// Sign out and clear stored credentials.
pub async fn logout(context: &AppContext, format: &OutputFormat) -> Result<()> {
    let mut session = context.auth_session();

    // Validation loads any persisted session; either path ends with the
    // stored credentials cleared.
    if session.validate_session().await {
        session.logout().await;
    }

    output::print_success("Signed out", format);
    Ok(())
}

/// Show authentication status.
pub async fn status(context: &AppContext, format: &OutputFormat) -> Result<()> {
    let mut session = context.auth_session();
    let signed_in = session.validate_session().await;
    let snapshot = session.snapshot();

    match format {
        OutputFormat::Text => {
            if signed_in {
                println!("Auth:     signed in");
                if let Some(user) = &snapshot.user {
                    output::print_row("User", user.email.as_deref().unwrap_or(&user.id));
                }
                if let Some(org_id) = &snapshot.org_id {
                    output::print_row("Org", org_id);
                }
                output::print_row("Session", &snapshot.session_id);
            } else {
                println!("Auth:     not signed in");
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
    }

    Ok(())
}

fn display_name(session: &AuthSession) -> String {
    session
        .user()
        .map(|user| user.email.clone().unwrap_or_else(|| user.id.clone()))
        .unwrap_or_else(|| "user".to_string())
}
