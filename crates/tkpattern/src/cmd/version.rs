use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("tkpattern {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: tkpattern");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("TKPATTERN_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "serial: vid={:04x} pid={:04x} speed={}",
        tkpattern_transport::TKEY_VID,
        tkpattern_transport::TKEY_PID,
        tkpattern_transport::DEFAULT_SPEED
    );
    println!(
        "app: {}{}",
        tkpattern_device::APP_NAME0,
        tkpattern_device::APP_NAME1
    );

    Ok(SUCCESS)
}
