use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    println!("agentwire {}", env!("CARGO_PKG_VERSION"));
    if args.extended {
        println!(
            "target: {}",
            option_env!("AGENTWIRE_BUILD_TARGET").unwrap_or("unknown")
        );
        println!("protocol version: {}", agentwire_codec::PROTOCOL_VERSION);
        println!("default port: {}", agentwire_net::endpoint::DEFAULT_PORT);
    }
    Ok(SUCCESS)
}
