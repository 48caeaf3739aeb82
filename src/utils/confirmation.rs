use rand::Rng;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub const CODE_LEN: usize = 8;

/// Human-facing booking reference. Uniqueness is enforced by the database
/// index; callers regenerate on collision.
pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_is_eight_chars() {
        assert_eq!(generate_code().len(), CODE_LEN);
    }

    #[test]
    fn code_uses_uppercase_alphanumerics_only() {
        for _ in 0..100 {
            let code = generate_code();
            assert!(code
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }
}
