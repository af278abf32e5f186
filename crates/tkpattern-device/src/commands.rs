//! The closed catalogue of messages spoken with the device.

use tkpattern_frame::{Cmd, CmdLen, Endpoint};

/// Response code the app uses for commands it does not know.
pub const RSP_UNKNOWN_CMD: u8 = 0xff;

/// Messages of the pattern app (application endpoint).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppCmd {
    GetNameVersion,
    RspGetNameVersion,
    SetPattern,
    RspSetPattern,
    GetPattern,
    RspGetPattern,
    Execute,
    RspExecute,
}

impl AppCmd {
    pub const ALL: [AppCmd; 8] = [
        AppCmd::GetNameVersion,
        AppCmd::RspGetNameVersion,
        AppCmd::SetPattern,
        AppCmd::RspSetPattern,
        AppCmd::GetPattern,
        AppCmd::RspGetPattern,
        AppCmd::Execute,
        AppCmd::RspExecute,
    ];

    /// The response a request is answered with. `None` for responses.
    pub fn response(self) -> Option<AppCmd> {
        match self {
            Self::GetNameVersion => Some(Self::RspGetNameVersion),
            Self::SetPattern => Some(Self::RspSetPattern),
            Self::GetPattern => Some(Self::RspGetPattern),
            Self::Execute => Some(Self::RspExecute),
            _ => None,
        }
    }

    /// Look up a request by its wire code. Only the device side needs this.
    pub fn request_from_code(code: u8) -> Option<AppCmd> {
        Self::ALL
            .into_iter()
            .find(|cmd| cmd.response().is_some() && cmd.code() == code)
    }
}

impl Cmd for AppCmd {
    fn code(&self) -> u8 {
        match self {
            Self::GetNameVersion => 0x01,
            Self::RspGetNameVersion => 0x02,
            Self::SetPattern => 0x03,
            Self::RspSetPattern => 0x04,
            Self::GetPattern => 0x05,
            Self::RspGetPattern => 0x06,
            Self::Execute => 0x07,
            Self::RspExecute => 0x08,
        }
    }

    fn cmd_len(&self) -> CmdLen {
        match self {
            Self::GetNameVersion => CmdLen::Len1,
            Self::RspGetNameVersion => CmdLen::Len32,
            Self::SetPattern => CmdLen::Len128,
            Self::RspSetPattern => CmdLen::Len4,
            Self::GetPattern => CmdLen::Len1,
            Self::RspGetPattern => CmdLen::Len128,
            Self::Execute => CmdLen::Len1,
            Self::RspExecute => CmdLen::Len1,
        }
    }

    fn endpoint(&self) -> Endpoint {
        Endpoint::App
    }

    fn name(&self) -> &'static str {
        match self {
            Self::GetNameVersion => "cmdGetNameVersion",
            Self::RspGetNameVersion => "rspGetNameVersion",
            Self::SetPattern => "cmdSetPattern",
            Self::RspSetPattern => "rspSetPattern",
            Self::GetPattern => "cmdGetPattern",
            Self::RspGetPattern => "rspGetPattern",
            Self::Execute => "cmdExecute",
            Self::RspExecute => "rspExecute",
        }
    }
}

/// Messages of the device firmware (firmware endpoint), used to bootstrap
/// the app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FwCmd {
    GetNameVersion,
    RspGetNameVersion,
    LoadApp,
    RspLoadApp,
    LoadAppData,
    RspLoadAppData,
    RspLoadAppDataReady,
}

impl FwCmd {
    pub const ALL: [FwCmd; 7] = [
        FwCmd::GetNameVersion,
        FwCmd::RspGetNameVersion,
        FwCmd::LoadApp,
        FwCmd::RspLoadApp,
        FwCmd::LoadAppData,
        FwCmd::RspLoadAppData,
        FwCmd::RspLoadAppDataReady,
    ];

    /// Look up a request by its wire code. Only the device side needs this.
    pub fn request_from_code(code: u8) -> Option<FwCmd> {
        [Self::GetNameVersion, Self::LoadApp, Self::LoadAppData]
            .into_iter()
            .find(|cmd| cmd.code() == code)
    }
}

impl Cmd for FwCmd {
    fn code(&self) -> u8 {
        match self {
            Self::GetNameVersion => 0x01,
            Self::RspGetNameVersion => 0x02,
            Self::LoadApp => 0x03,
            Self::RspLoadApp => 0x04,
            Self::LoadAppData => 0x05,
            Self::RspLoadAppData => 0x06,
            Self::RspLoadAppDataReady => 0x07,
        }
    }

    fn cmd_len(&self) -> CmdLen {
        match self {
            Self::GetNameVersion => CmdLen::Len1,
            Self::RspGetNameVersion => CmdLen::Len32,
            Self::LoadApp => CmdLen::Len128,
            Self::RspLoadApp => CmdLen::Len4,
            Self::LoadAppData => CmdLen::Len128,
            Self::RspLoadAppData => CmdLen::Len4,
            Self::RspLoadAppDataReady => CmdLen::Len128,
        }
    }

    fn endpoint(&self) -> Endpoint {
        Endpoint::Firmware
    }

    fn name(&self) -> &'static str {
        match self {
            Self::GetNameVersion => "cmdFwGetNameVersion",
            Self::RspGetNameVersion => "rspFwGetNameVersion",
            Self::LoadApp => "cmdLoadApp",
            Self::RspLoadApp => "rspLoadApp",
            Self::LoadAppData => "cmdLoadAppData",
            Self::RspLoadAppData => "rspLoadAppData",
            Self::RspLoadAppDataReady => "rspLoadAppDataReady",
        }
    }
}
