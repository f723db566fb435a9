use crate::api;
use crate::cli::{actions::Action, globals::GlobalArgs};
use anyhow::Result;
use url::Url;

/// Handle the server action
pub async fn handle(action: Action, globals: &GlobalArgs) -> Result<()> {
    match action {
        Action::Server {
            port,
            dsn,
            frontend_url,
        } => {
            // Fail fast on an unparseable DSN instead of at pool connect.
            let dsn = Url::parse(&dsn)?;

            api::serve(port, dsn.to_string(), &frontend_url, globals).await?;
        }
    }

    Ok(())
}
