use anyhow::Context;
use stockbook_db::{ConnectionManager, DatabaseValue};

/// Run one statement with CLI-supplied parameters and print the JSON result
pub async fn run(manager: &ConnectionManager, sql: &str, params: &[String]) -> anyhow::Result<()> {
    let params = parse_params(params);

    let result = manager
        .run_query(sql, &params)
        .await
        .context("Query failed")?;

    println!("{}", serde_json::to_string_pretty(&result.to_json())?);
    Ok(())
}

fn parse_params(raw: &[String]) -> Vec<DatabaseValue> {
    raw.iter().map(|arg| DatabaseValue::parse_cli_arg(arg)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_params_infers_types() {
        let raw = vec!["5".to_string(), "ada".to_string(), "null".to_string()];
        assert_eq!(
            parse_params(&raw),
            vec![
                DatabaseValue::Int64(5),
                DatabaseValue::String("ada".to_string()),
                DatabaseValue::Null,
            ]
        );
    }

    #[test]
    fn test_parse_params_keeps_hostile_text_whole() {
        let raw = vec!["5; DROP TABLE user".to_string()];
        assert_eq!(
            parse_params(&raw),
            vec![DatabaseValue::String("5; DROP TABLE user".to_string())]
        );
    }
}
