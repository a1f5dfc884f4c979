use crate::args::{ArgsError, NormalizedArgs};
use std::os::windows::ffi::OsStrExt;
use windows_sys::Win32::System::SystemInformation::{
    VerSetConditionMask, VerifyVersionInfoW, OSVERSIONINFOEXW, VER_MAJORVERSION,
    VER_MINORVERSION, VER_PRODUCT_TYPE, VER_SERVICEPACKMAJOR,
};
use windows_sys::Win32::System::SystemServices::{VER_EQUAL, VER_GREATER_EQUAL, VER_NT_WORKSTATION};

pub(super) fn native_args() -> Result<NormalizedArgs, ArgsError> {
    let wide: Vec<Vec<u16>> = std::env::args_os()
        .map(|arg| arg.encode_wide().collect())
        .collect();
    NormalizedArgs::from_wide(wide)
}

fn version_at_least(major: u32, minor: u32) -> bool {
    let mut info: OSVERSIONINFOEXW = unsafe { std::mem::zeroed() };
    info.dwOSVersionInfoSize = std::mem::size_of::<OSVERSIONINFOEXW>() as u32;
    info.dwMajorVersion = major;
    info.dwMinorVersion = minor;
    info.wServicePackMajor = 0;

    unsafe {
        let mut mask = VerSetConditionMask(0, VER_MAJORVERSION, VER_GREATER_EQUAL as u8);
        mask = VerSetConditionMask(mask, VER_MINORVERSION, VER_GREATER_EQUAL as u8);
        mask = VerSetConditionMask(mask, VER_SERVICEPACKMAJOR, VER_GREATER_EQUAL as u8);
        VerifyVersionInfoW(
            &mut info,
            VER_MAJORVERSION | VER_MINORVERSION | VER_SERVICEPACKMAJOR,
            mask,
        ) != 0
    }
}

fn is_server() -> bool {
    let mut info: OSVERSIONINFOEXW = unsafe { std::mem::zeroed() };
    info.dwOSVersionInfoSize = std::mem::size_of::<OSVERSIONINFOEXW>() as u32;
    info.wProductType = VER_NT_WORKSTATION as u8;

    unsafe {
        let mask = VerSetConditionMask(0, VER_PRODUCT_TYPE, VER_EQUAL as u8);
        VerifyVersionInfoW(&mut info, VER_PRODUCT_TYPE, mask) == 0
    }
}

/// Windows 8.1, or Server 2012 (experimental tier), is the minimum
pub(super) fn check_version() {
    let supported = version_at_least(6, 3) || (is_server() && version_at_least(6, 2));
    if !supported {
        tracing::warn!(
            "running on an unsupported Windows release; set {}=1 to silence this check",
            super::SKIP_CHECK_VAR
        );
    }
}
