//! Live Windows registry access.
//!
//! Keys are opened read-only. Handles close on drop. `REG_EXPAND_SZ` values
//! are expanded against the current environment, matching what other
//! registry consumers see.

use super::{RegValue, RegistryError, RegistryKey, RegistryStore};
use ia_common::RegistryScope;
use std::ffi::OsString;
use std::os::windows::ffi::{OsStrExt, OsStringExt};
use std::ptr;
use tracing::trace;
use windows_sys::Win32::Foundation::{
    ERROR_ACCESS_DENIED, ERROR_FILE_NOT_FOUND, ERROR_MORE_DATA, ERROR_NO_MORE_ITEMS,
    ERROR_PATH_NOT_FOUND, ERROR_SUCCESS,
};
use windows_sys::Win32::System::Environment::ExpandEnvironmentStringsW;
use windows_sys::Win32::System::Registry::{
    RegCloseKey, RegEnumKeyExW, RegOpenKeyExW, RegQueryValueExW, HKEY, HKEY_CURRENT_USER,
    HKEY_LOCAL_MACHINE, KEY_READ, REG_DWORD, REG_EXPAND_SZ, REG_SZ, REG_VALUE_TYPE,
};

/// Longest key name the registry allows, plus the terminator.
const MAX_KEY_NAME_CHARS: usize = 256;

/// [`RegistryStore`] backed by the live registry.
#[derive(Debug, Default)]
pub struct WindowsRegistry;

impl WindowsRegistry {
    pub fn new() -> Self {
        WindowsRegistry
    }
}

impl RegistryStore for WindowsRegistry {
    fn describe(&self) -> String {
        "windows".to_string()
    }

    fn open(
        &self,
        scope: RegistryScope,
        path: &str,
    ) -> Result<Option<Box<dyn RegistryKey + '_>>, RegistryError> {
        let root = match scope {
            RegistryScope::CurrentUser => HKEY_CURRENT_USER,
            RegistryScope::LocalMachine => HKEY_LOCAL_MACHINE,
        };
        let full_path = format!(r"{}\{}", scope.hive_name(), path);
        Ok(open_key(root, path, full_path)?.map(|k| Box::new(k) as Box<dyn RegistryKey>))
    }
}

struct OwnedKey {
    handle: HKEY,
    path: String,
}

impl Drop for OwnedKey {
    fn drop(&mut self) {
        // SAFETY: handle came from a successful RegOpenKeyExW and is closed once.
        unsafe {
            RegCloseKey(self.handle);
        }
    }
}

fn to_wide(s: &str) -> Vec<u16> {
    std::ffi::OsStr::new(s)
        .encode_wide()
        .chain(std::iter::once(0))
        .collect()
}

fn from_wide(buf: &[u16]) -> String {
    let end = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    OsString::from_wide(&buf[..end])
        .to_string_lossy()
        .into_owned()
}

fn open_key(parent: HKEY, sub_path: &str, full_path: String) -> Result<Option<OwnedKey>, RegistryError> {
    let wide = to_wide(sub_path);
    let mut handle: HKEY = ptr::null_mut();
    // SAFETY: `wide` is NUL-terminated and outlives the call; `handle` is a valid out pointer.
    let status = unsafe { RegOpenKeyExW(parent, wide.as_ptr(), 0, KEY_READ, &mut handle) };
    match status {
        ERROR_SUCCESS => Ok(Some(OwnedKey {
            handle,
            path: full_path,
        })),
        ERROR_FILE_NOT_FOUND | ERROR_PATH_NOT_FOUND => Ok(None),
        ERROR_ACCESS_DENIED => Err(RegistryError::AccessDenied { path: full_path }),
        code => Err(RegistryError::Os {
            path: full_path,
            code,
        }),
    }
}

fn expand_environment(raw: &str) -> String {
    let wide = to_wide(raw);
    // SAFETY: a null destination with size 0 asks for the required length.
    let needed = unsafe { ExpandEnvironmentStringsW(wide.as_ptr(), ptr::null_mut(), 0) };
    if needed == 0 {
        return raw.to_string();
    }
    let mut buf = vec![0u16; needed as usize];
    // SAFETY: `buf` holds exactly `needed` u16s.
    let written = unsafe { ExpandEnvironmentStringsW(wide.as_ptr(), buf.as_mut_ptr(), needed) };
    if written == 0 || written > needed {
        return raw.to_string();
    }
    from_wide(&buf)
}

impl RegistryKey for OwnedKey {
    fn path(&self) -> &str {
        &self.path
    }

    fn subkey_names(&self) -> Result<Vec<String>, RegistryError> {
        let mut names = Vec::new();
        let mut index = 0u32;
        loop {
            let mut buf = [0u16; MAX_KEY_NAME_CHARS];
            let mut len = buf.len() as u32;
            // SAFETY: `buf`/`len` describe a valid writable buffer; optional outputs are null.
            let status = unsafe {
                RegEnumKeyExW(
                    self.handle,
                    index,
                    buf.as_mut_ptr(),
                    &mut len,
                    ptr::null(),
                    ptr::null_mut(),
                    ptr::null_mut(),
                    ptr::null_mut(),
                )
            };
            match status {
                ERROR_SUCCESS => names.push(from_wide(&buf[..len as usize])),
                ERROR_NO_MORE_ITEMS => break,
                ERROR_ACCESS_DENIED => {
                    return Err(RegistryError::AccessDenied {
                        path: self.path.clone(),
                    })
                }
                code => {
                    return Err(RegistryError::Os {
                        path: self.path.clone(),
                        code,
                    })
                }
            }
            index += 1;
        }
        Ok(names)
    }

    fn open_subkey(&self, name: &str) -> Result<Option<Box<dyn RegistryKey + '_>>, RegistryError> {
        let full_path = format!(r"{}\{}", self.path, name);
        Ok(open_key(self.handle, name, full_path)?.map(|k| Box::new(k) as Box<dyn RegistryKey>))
    }

    fn value(&self, name: &str) -> Option<RegValue> {
        let wide_name = to_wide(name);
        let mut kind: REG_VALUE_TYPE = 0;
        let mut size = 0u32;
        // SAFETY: a null data pointer asks for type and size only.
        let status = unsafe {
            RegQueryValueExW(
                self.handle,
                wide_name.as_ptr(),
                ptr::null(),
                &mut kind,
                ptr::null_mut(),
                &mut size,
            )
        };
        if status != ERROR_SUCCESS && status != ERROR_MORE_DATA {
            return None;
        }

        let mut data = vec![0u8; size as usize];
        // SAFETY: `data` holds `size` bytes as reported by the previous call.
        let status = unsafe {
            RegQueryValueExW(
                self.handle,
                wide_name.as_ptr(),
                ptr::null(),
                &mut kind,
                data.as_mut_ptr(),
                &mut size,
            )
        };
        if status != ERROR_SUCCESS {
            trace!(key = %self.path, value = name, status, "value read failed");
            return None;
        }
        data.truncate(size as usize);

        match kind {
            REG_SZ | REG_EXPAND_SZ => {
                let units: Vec<u16> = data
                    .chunks_exact(2)
                    .map(|c| u16::from_le_bytes([c[0], c[1]]))
                    .collect();
                let s = from_wide(&units);
                if kind == REG_EXPAND_SZ {
                    Some(RegValue::String(expand_environment(&s)))
                } else {
                    Some(RegValue::String(s))
                }
            }
            REG_DWORD if data.len() >= 4 => Some(RegValue::Dword(u32::from_le_bytes([
                data[0], data[1], data[2], data[3],
            ]))),
            _ => None,
        }
    }
}
