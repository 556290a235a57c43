use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use agentwire_codec::{EntityClass, MessageClass};
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    schema_id: &'a str,
    direction: &'a str,
    message_class: String,
    entity_class: String,
    payload_size: usize,
    payload: &'a str,
    timestamp: String,
}

pub fn print_message(
    direction: &str,
    class: MessageClass,
    entity: EntityClass,
    payload: &str,
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                schema_id: "https://schemas.agentwire.dev/cli/v1/message.schema.json",
                direction,
                message_class: class.to_string(),
                entity_class: entity.to_string(),
                payload_size: payload.len(),
                payload,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["DIRECTION", "CLASS", "ENTITY", "PAYLOAD"])
                .add_row(vec![
                    direction.to_string(),
                    class.to_string(),
                    entity.to_string(),
                    payload.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("{direction}: class={class} entity={entity} payload={payload}");
        }
        OutputFormat::Raw => {
            print_raw(payload.as_bytes());
            println!();
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
