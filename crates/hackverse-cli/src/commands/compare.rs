use anyhow::anyhow;
use hackverse_batch::FlagPolicy;
use hackverse_scan::ComparisonResult;
use serde_json::json;

use crate::cli::{CompareArgs, OutputFormat};
use crate::client::{AppContext, CliError, CliResult, classify_response};
use crate::output::{CompareOutcome, render_comparison};

pub(crate) async fn handle_compare(
    ctx: &AppContext,
    args: &CompareArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let outcome = compare_remote(ctx, args).await?;
    render_comparison(&outcome, format)
}

async fn compare_remote(ctx: &AppContext, args: &CompareArgs) -> CliResult<CompareOutcome> {
    let repo_a = args.repo_a.trim();
    let repo_b = args.repo_b.trim();
    if repo_a.is_empty() || repo_b.is_empty() {
        return Err(CliError::validation("both repository URLs are required"));
    }

    let url = ctx.endpoint("/compare")?;
    let request = ctx
        .client
        .post(url)
        .json(&json!({ "repoA": repo_a, "repoB": repo_b }));
    let response = ctx
        .authorize(request)
        .send()
        .await
        .map_err(|err| CliError::failure(anyhow!("request to /compare failed: {err}")))?;

    if !response.status().is_success() {
        return Err(classify_response(response).await);
    }
    let result = response
        .json::<ComparisonResult>()
        .await
        .map_err(|err| CliError::failure(anyhow!("failed to parse comparison result: {err}")))?;

    Ok(CompareOutcome {
        repo_a: repo_a.to_string(),
        repo_b: repo_b.to_string(),
        score: result.score,
        flagged: FlagPolicy::new(args.threshold).is_flagged(result.score),
    })
}
