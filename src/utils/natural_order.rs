use std::cmp::Ordering;
use std::iter::Peekable;
use std::str::Chars;

/// Сравнение строк "как в Finder": без учёта регистра, цифровые
/// последовательности сравниваются как числа ("app2" < "app10").
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();

    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let l_digits = take_digits(&mut left);
                let r_digits = take_digits(&mut right);
                let ord = compare_digit_runs(&l_digits, &r_digits);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(l), Some(r)) => {
                let ord = l.to_lowercase().cmp(r.to_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
                left.next();
                right.next();
            }
        }
    }
}

fn take_digits(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.next_if(|c| c.is_ascii_digit()) {
        digits.push(c);
    }
    digits
}

fn compare_digit_runs(a: &str, b: &str) -> Ordering {
    let a_trimmed = a.trim_start_matches('0');
    let b_trimmed = b.trim_start_matches('0');
    a_trimmed
        .len()
        .cmp(&b_trimmed.len())
        .then_with(|| a_trimmed.cmp(b_trimmed))
        .then_with(|| a.len().cmp(&b.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive() {
        assert_eq!(natural_cmp("com.Apple", "com.banana"), Ordering::Less);
        assert_eq!(natural_cmp("COM.B", "com.a"), Ordering::Greater);
    }

    #[test]
    fn test_numeric_runs() {
        assert_eq!(natural_cmp("app2", "app10"), Ordering::Less);
        assert_eq!(natural_cmp("app010", "app9"), Ordering::Greater);
        assert_eq!(natural_cmp("v1.2", "v1.10"), Ordering::Less);
    }

    #[test]
    fn test_prefix_and_equal() {
        assert_eq!(natural_cmp("com.a", "com.a.helper"), Ordering::Less);
        assert_eq!(natural_cmp("com.a", "com.a"), Ordering::Equal);
    }

    #[test]
    fn test_sorting_identifiers() {
        let mut ids = vec!["org.Mozilla.firefox", "com.b", "Com.a", "com.app10", "com.app9"];
        ids.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(
            ids,
            vec!["Com.a", "com.app9", "com.app10", "com.b", "org.Mozilla.firefox"]
        );
    }
}
