use aws_sdk_ssm::Client;

// All integration configuration lives under this prefix in Parameter Store.
pub const PARAM_PREFIX: &str = "/sechub/integration";

pub async fn get_param(
    client: &Client,
    name: &str,
    encrypted: bool,
) -> Result<String, Box<dyn std::error::Error>> {
    let response = client
        .get_parameter()
        .name(name)
        .with_decryption(encrypted)
        .send()
        .await?;

    let value = response
        .parameter
        .and_then(|parameter| parameter.value)
        .ok_or_else(|| format!("parameter {} has no value", name))?;

    Ok(value)
}
