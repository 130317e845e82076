//! Purpose: Hold top-level CLI command dispatch for `linedb`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Each command maps onto exactly one public database operation per record.

use super::*;
use linedb::api::Query;

pub(super) async fn dispatch_command(command: Command, db: &Database) -> Result<RunOutcome, Error> {
    match command {
        Command::Insert { collection, record } => {
            match record {
                Some(text) => {
                    let value = parse_json_arg(&text, "record")?;
                    let record = db.insert(&collection, value).await?;
                    emit_line(&Value::Object(record));
                }
                None => {
                    let stdin = io::stdin();
                    let stream = serde_json::Deserializer::from_reader(stdin.lock()).into_iter::<Value>();
                    for (index, value) in stream.enumerate() {
                        let value = value.map_err(|err| {
                            Error::new(ErrorKind::Usage)
                                .with_message(format!("stdin value {} is not valid JSON", index + 1))
                                .with_source(err)
                        })?;
                        let record = db.insert(&collection, value).await?;
                        emit_line(&Value::Object(record));
                    }
                }
            }
            Ok(RunOutcome::ok())
        }
        Command::Find { collection, query } => {
            let query = match query {
                Some(text) => Query::from_value(parse_json_arg(&text, "query")?)?,
                None => Query::all(),
            };
            for record in db.find(&collection, query).await? {
                emit_line(&Value::Object(record));
            }
            Ok(RunOutcome::ok())
        }
        Command::Clear { collection } => {
            db.clear(&collection).await?;
            emit_line(&json!({ "cleared": collection }));
            Ok(RunOutcome::ok())
        }
    }
}

fn parse_json_arg(text: &str, what: &str) -> Result<Value, Error> {
    serde_json::from_str(text).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("{what} is not valid JSON"))
            .with_hint("Quote the JSON for your shell, e.g. '{\"id\": 1}'.")
            .with_source(err)
    })
}
