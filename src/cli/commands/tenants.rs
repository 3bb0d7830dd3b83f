use serde_json::json;

use crate::cli::utils::output_empty_collection;
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::server::build_state;

pub async fn handle(config: &AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    let state = build_state(config).await?;
    let tenants = state.directory.list_active().await?;

    if tenants.is_empty() {
        return output_empty_collection(&output_format, "tenants", "No active tenants");
    }

    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({ "tenants": tenants }))?);
        }
        OutputFormat::Text => {
            println!("{:<24} {}", "CODE", "NAME");
            for tenant in &tenants {
                println!("{:<24} {}", tenant.tenant_code, tenant.tenant_name);
            }
        }
    }
    Ok(())
}
