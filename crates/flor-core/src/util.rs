//! Small string helpers shared by the emitters and the PR text.

use rand::Rng;

const ASCII_LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Random string of ASCII letters, used for throwaway branch names.
pub fn rand_ascii_str(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| ASCII_LETTERS[rng.random_range(0..ASCII_LETTERS.len())] as char)
        .collect()
}

/// Backslash-escape every character of `s` that appears in `illegal`.
pub fn sanitize_string(s: &str, illegal: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if illegal.contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Capitalise the first letter of every alphabetic run (`hydro` -> `Hydro`).
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_string() {
        assert_eq!(sanitize_string("say \"hi\"", "\""), "say \\\"hi\\\"");
        assert_eq!(sanitize_string("plain", "\"$"), "plain");
    }

    #[test]
    fn test_rand_ascii_str() {
        let s = rand_ascii_str(10);
        assert_eq!(s.len(), 10);
        assert!(s.chars().all(|c| c.is_ascii_alphabetic()));
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("hydro"), "Hydro");
        assert_eq!(title_case("boxturtle"), "Boxturtle");
        assert_eq!(title_case("C"), "C");
        assert_eq!(title_case("ros2-rolling"), "Ros2-Rolling");
    }
}
