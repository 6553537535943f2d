use futures::StreamExt;
use ledgerpay_http::{ApiRequest, ClientOptions, LedgerClient, RequestOptions, Validate};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct InternalAccount {
    id: String,
    name: Option<String>,
    currency: Option<String>,
}

impl Validate for InternalAccount {
    fn validate(&self) -> ledgerpay_http::Result<()> {
        ledgerpay_http::require("InternalAccount", "currency", &self.currency)?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let client = LedgerClient::from_env()
        .map_err(anyhow::Error::msg)?
        .with_options(ClientOptions {
            idempotency_header: Some("Idempotency-Key".to_owned()),
            ..ClientOptions::default()
        });

    let first = client
        .list::<InternalAccount>(
            ApiRequest::get()
                .path_segment("internal_accounts")
                .query("per_page", "25"),
            RequestOptions::new(),
        )
        .await?;

    let mut accounts = Box::pin(first.into_stream());
    while let Some(account) = accounts.next().await {
        let account = account?;
        println!(
            "{} {} {}",
            account.id,
            account.name.as_deref().unwrap_or("-"),
            account.currency.as_deref().unwrap_or("-")
        );
    }

    Ok(())
}
