use rand::Rng;

/// Uppercase alphanumeric alphabet for confirmation codes.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub const DELIVERY_CODE_LEN: usize = 6;
pub const PICKUP_CODE_LEN: usize = 5;

/// Generate a random uppercase alphanumeric code of the given length.
pub fn short_code(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| {
            let idx = rng.gen_range(0..CODE_ALPHABET.len());
            CODE_ALPHABET[idx] as char
        })
        .collect()
}

/// Code the buyer hands over to confirm the delivery (6 chars).
pub fn delivery_code() -> String {
    short_code(DELIVERY_CODE_LEN)
}

/// Code the courier presents at the store to collect the package (5 chars).
pub fn pickup_code() -> String {
    short_code(PICKUP_CODE_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_lengths() {
        assert_eq!(delivery_code().len(), 6);
        assert_eq!(pickup_code().len(), 5);
    }

    #[test]
    fn test_code_charset() {
        for _ in 0..50 {
            let code = delivery_code();
            assert!(code
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_codes_vary() {
        // 36^6 combinations; fifty draws colliding would mean a broken RNG
        let codes: std::collections::HashSet<String> =
            (0..50).map(|_| delivery_code()).collect();
        assert!(codes.len() > 1);
    }
}
