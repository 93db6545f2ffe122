//! ISBN-10 / ISBN-13 normalisation and checksum validation

/// Strip hyphens and spaces from a user-entered ISBN
pub fn normalize_isbn(isbn: &str) -> String {
    isbn.chars().filter(|c| *c != '-' && !c.is_whitespace()).collect()
}

/// True if the (already normalised) string is a valid ISBN-10 or ISBN-13
pub fn is_valid_isbn(isbn: &str) -> bool {
    is_valid_isbn10(isbn) || is_valid_isbn13(isbn)
}

/// ISBN-10: weighted sum (1..=10) divisible by 11, `X` allowed as the check digit
pub fn is_valid_isbn10(isbn: &str) -> bool {
    let bytes = isbn.as_bytes();
    if bytes.len() != 10 {
        return false;
    }

    let mut sum = 0u32;
    for (i, b) in bytes.iter().enumerate() {
        let value = match b {
            b'0'..=b'9' => u32::from(b - b'0'),
            b'X' if i == 9 => 10,
            _ => return false,
        };
        sum += (i as u32 + 1) * value;
    }

    sum % 11 == 0
}

/// ISBN-13: alternating 1/3 weights, sum divisible by 10
pub fn is_valid_isbn13(isbn: &str) -> bool {
    let bytes = isbn.as_bytes();
    if bytes.len() != 13 || !bytes.iter().all(u8::is_ascii_digit) {
        return false;
    }

    let sum: u32 = bytes
        .iter()
        .enumerate()
        .map(|(i, b)| {
            let digit = u32::from(b - b'0');
            if i % 2 == 0 { digit } else { digit * 3 }
        })
        .sum();

    sum % 10 == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_separators() {
        assert_eq!(normalize_isbn("978-0 14-044913-6"), "9780140449136");
    }

    #[test]
    fn test_isbn10() {
        assert!(is_valid_isbn10("0140449132"));
        assert!(is_valid_isbn10("080442957X"));
        assert!(!is_valid_isbn10("0140449133"));
        assert!(!is_valid_isbn10("X140449132"));
        assert!(!is_valid_isbn10("014044913"));
    }

    #[test]
    fn test_isbn13() {
        assert!(is_valid_isbn13("9780140449136"));
        assert!(!is_valid_isbn13("9780140449137"));
        assert!(!is_valid_isbn13("978014044913X"));
    }

    #[test]
    fn test_either_form() {
        assert!(is_valid_isbn("0140449132"));
        assert!(is_valid_isbn("9780140449136"));
        assert!(!is_valid_isbn(""));
    }
}
