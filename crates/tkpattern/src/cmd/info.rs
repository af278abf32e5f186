use serde::Serialize;
use tkpattern_device::NameVersion;

use crate::cmd::{open_session, InfoArgs};
use crate::exit::{device_error, CliResult, SUCCESS};
use crate::output::{print_report, OutputFormat, Report};

#[derive(Serialize)]
struct InfoOutput {
    device: String,
    mode: &'static str,
    firmware: Option<NameVersion>,
    app: Option<NameVersion>,
    pattern_app: bool,
}

impl Report for InfoOutput {
    fn fields(&self) -> Vec<(&'static str, String)> {
        let describe = |nv: &Option<NameVersion>| match nv {
            Some(nv) => format!("{}{} v{}", nv.name0, nv.name1, nv.version),
            None => "-".to_string(),
        };
        vec![
            ("device", self.device.clone()),
            ("mode", self.mode.to_string()),
            ("firmware", describe(&self.firmware)),
            ("app", describe(&self.app)),
            ("pattern_app", self.pattern_app.to_string()),
        ]
    }
}

pub fn run(args: InfoArgs, format: OutputFormat) -> CliResult<i32> {
    let (target, mut session) = open_session(&args.port, None)?;

    let firmware = session
        .probe_firmware()
        .map_err(|err| device_error("firmware probe failed", err))?;
    let app = match firmware {
        Some(_) => None,
        None => Some(
            session
                .get_identity()
                .map_err(|err| device_error("app identity probe failed", err))?,
        ),
    };
    session.close();

    let out = InfoOutput {
        device: target.to_string(),
        mode: if firmware.is_some() { "firmware" } else { "app" },
        pattern_app: app.as_ref().is_some_and(NameVersion::is_pattern_app),
        firmware,
        app,
    };
    print_report(&out, format);
    Ok(SUCCESS)
}
