use shadowscreen::frame::{DEFAULT_MAX_MESSAGE, LENGTH_PREFIX_SIZE};
use shadowscreen::record::HEADER_SIZE;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("shadowscreen {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: shadowscreen");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "build_target: {}",
        option_env!("SHADOWSCREEN_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!(
        "wire: length_prefix={LENGTH_PREFIX_SIZE}B record_header={HEADER_SIZE}B max_message={DEFAULT_MAX_MESSAGE}B"
    );
    println!(
        "transports: tcp{}",
        if cfg!(unix) { ", unix" } else { "" }
    );

    Ok(SUCCESS)
}
