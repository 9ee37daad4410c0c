use bulkstream_frame::{HEADER_SIZE, MAGIC, PROTOCOL_VERSION};
use bulkstream_transport::CAPTURE_VERSION;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("bulkstream {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: bulkstream");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "build_target: {}",
        option_env!("BULKSTREAM_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!(
        "protocol: version={PROTOCOL_VERSION} magic=0x{MAGIC:04X} header={HEADER_SIZE}B"
    );
    println!("capture_format: BSCP v{CAPTURE_VERSION}");

    Ok(SUCCESS)
}
