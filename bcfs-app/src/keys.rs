use bcfs_core::ResponseKey;
use winit::keyboard::{KeyCode, PhysicalKey};

/// Maps a physical key onto one of the four logical keys. Escape aborts
/// like `q`.
pub fn response_key(key: PhysicalKey) -> Option<ResponseKey> {
    let PhysicalKey::Code(code) = key else {
        return None;
    };
    match code {
        KeyCode::Space => Some(ResponseKey::Space),
        KeyCode::KeyA => Some(ResponseKey::A),
        KeyCode::KeyZ => Some(ResponseKey::Z),
        KeyCode::KeyQ | KeyCode::Escape => Some(ResponseKey::Q),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::keyboard::NativeKeyCode;

    #[test]
    fn maps_the_four_keys() {
        assert_eq!(response_key(PhysicalKey::Code(KeyCode::Space)), Some(ResponseKey::Space));
        assert_eq!(response_key(PhysicalKey::Code(KeyCode::KeyA)), Some(ResponseKey::A));
        assert_eq!(response_key(PhysicalKey::Code(KeyCode::KeyZ)), Some(ResponseKey::Z));
        assert_eq!(response_key(PhysicalKey::Code(KeyCode::KeyQ)), Some(ResponseKey::Q));
        assert_eq!(response_key(PhysicalKey::Code(KeyCode::Escape)), Some(ResponseKey::Q));
    }

    #[test]
    fn other_keys_are_ignored() {
        assert_eq!(response_key(PhysicalKey::Code(KeyCode::KeyB)), None);
        assert_eq!(response_key(PhysicalKey::Unidentified(NativeKeyCode::Unidentified)), None);
    }
}
