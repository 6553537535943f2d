use ledgerpay_http::{ApiRequest, BlockingLedgerClient, LedgerError, RequestOptions};

fn main() -> anyhow::Result<()> {
    let client = BlockingLedgerClient::from_env().map_err(anyhow::Error::msg)?;

    let request = ApiRequest::post()
        .path_segment("payment_orders")
        .json(&serde_json::json!({
            "type": "ach",
            "amount": 1000,
            "direction": "credit",
            "originating_account_id": std::env::var("LEDGERPAY_ACCOUNT_ID")?,
        }))?;

    match client.execute::<serde_json::Value>(request, RequestOptions::new().max_retries(4)) {
        Ok(order) => println!("created {order}"),
        Err(LedgerError::Network { attempts, source }) => {
            eprintln!("gave up after {attempts} attempt(s): {source}");
        }
        Err(err) => return Err(err.into()),
    }

    Ok(())
}
