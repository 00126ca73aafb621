use anyhow::anyhow;
use serde::Deserialize;

use crate::cli::OutputFormat;
use crate::client::{AppContext, CliError, CliResult, classify_response};
use crate::output::render_health;

#[derive(Deserialize)]
struct HealthBody {
    ok: bool,
}

pub(crate) async fn handle_health(ctx: &AppContext, format: OutputFormat) -> CliResult<()> {
    let url = ctx.endpoint("/health")?;
    let response = ctx
        .client
        .get(url)
        .send()
        .await
        .map_err(|err| CliError::failure(anyhow!("request to /health failed: {err}")))?;

    if !response.status().is_success() {
        return Err(classify_response(response).await);
    }
    let body = response
        .json::<HealthBody>()
        .await
        .map_err(|err| CliError::failure(anyhow!("failed to parse health response: {err}")))?;
    render_health(body.ok, format)?;
    if body.ok {
        Ok(())
    } else {
        Err(CliError::failure(anyhow!("service reported unhealthy")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use reqwest::Client;
    use std::error::Error;

    fn context_for(server: &MockServer) -> Result<AppContext, Box<dyn Error>> {
        Ok(AppContext {
            client: Client::new(),
            base_url: server.base_url().parse()?,
            api_key: None,
        })
    }

    #[tokio::test]
    async fn healthy_service_succeeds() -> Result<(), Box<dyn Error>> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET).path("/health");
            then.status(200).json_body(serde_json::json!({ "ok": true }));
        });

        handle_health(&context_for(&server)?, OutputFormat::Json)
            .await
            .map_err(|err| err.display_message())?;
        mock.assert();
        Ok(())
    }

    #[tokio::test]
    async fn server_error_is_a_failure() -> Result<(), Box<dyn Error>> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/health");
            then.status(503).body("down");
        });

        let err = handle_health(&context_for(&server)?, OutputFormat::Table)
            .await
            .expect_err("503 should fail");
        assert_eq!(err.exit_code(), 3);
        assert!(err.display_message().contains("down"));
        Ok(())
    }
}
