use crate::balance::Balance;
use crate::error::ApiError;

/// Renders balances as `member,balance` CSV rows, in member name order.
pub fn balances_to_csv(balance: &Balance) -> Result<String, ApiError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["member", "balance"])?;
    for (member, value) in balance {
        let value = format!("{value:.2}");
        writer.write_record([member.as_str(), value.as_str()])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| ApiError::Export(err.to_string()))?;
    String::from_utf8(bytes).map_err(|err| ApiError::Export(err.to_string()))
}
