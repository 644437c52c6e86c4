use std::collections::HashMap;

/// 金额接近度置信度
///
/// 两者都为 0 返回 1.0，只有一个为 0 返回 0.0，
/// 否则 `max(0, 1 - 2·|a-b|/max(a,b))`，相对差达到 50% 时归零。
pub fn amount_confidence(a: f64, b: f64) -> f64 {
    if a == 0.0 && b == 0.0 {
        return 1.0;
    }
    if a == 0.0 || b == 0.0 {
        return 0.0;
    }
    let diff = (a - b).abs();
    if diff == 0.0 {
        return 1.0;
    }
    let relative = diff / f64::max(a, b);
    f64::max(0.0, 1.0 - relative * 2.0)
}

/// 字符串相似度 (忽略大小写的 Ratcliff/Obershelp 比值): `2·M / (|a| + |b|)`
///
/// M 为递归找到的最长公共块的总长度；任一为空返回 0.0。
pub fn string_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    let matched = matching_size(&a, &b);
    2.0 * matched as f64 / (a.len() + b.len()) as f64
}

/// 所有匹配块长度之和
fn matching_size(a: &[char], b: &[char]) -> usize {
    let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
    for (j, c) in b.iter().enumerate() {
        b2j.entry(*c).or_default().push(j);
    }

    let mut total = 0;
    let mut queue = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let (i, j, k) = longest_match(a, &b2j, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        total += k;
        if alo < i && blo < j {
            queue.push((alo, i, blo, j));
        }
        if i + k < ahi && j + k < bhi {
            queue.push((i + k, ahi, j + k, bhi));
        }
    }
    total
}

/// a[alo..ahi] 与 b[blo..bhi] 的最长公共子串，长度相同时取最靠前的
fn longest_match(
    a: &[char],
    b2j: &HashMap<char, Vec<usize>>,
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_k) = (alo, blo, 0);
    // runs[j - blo + 1] = 以 (i, j) 结尾的公共子串长度
    let width = bhi - blo + 1;
    let mut prev = vec![0usize; width];

    for i in alo..ahi {
        let mut cur = vec![0usize; width];
        if let Some(positions) = b2j.get(&a[i]) {
            for &j in positions {
                if j < blo {
                    continue;
                }
                if j >= bhi {
                    break;
                }
                let k = prev[j - blo] + 1;
                cur[j - blo + 1] = k;
                if k > best_k {
                    best_i = i + 1 - k;
                    best_j = j + 1 - k;
                    best_k = k;
                }
            }
        }
        prev = cur;
    }
    (best_i, best_j, best_k)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_confidence_edges() {
        assert_eq!(amount_confidence(100.0, 100.0), 1.0);
        assert_eq!(amount_confidence(0.0, 0.0), 1.0);
        assert_eq!(amount_confidence(100.0, 0.0), 0.0);
        assert_eq!(amount_confidence(0.0, 100.0), 0.0);
        assert_eq!(amount_confidence(100.0, 150.0), 0.0);
        assert_eq!(amount_confidence(100.0, 400.0), 0.0);
    }

    #[test]
    fn amount_confidence_is_symmetric_and_linear() {
        let c = amount_confidence(100.0, 110.0);
        assert!((c - (1.0 - 2.0 * 10.0 / 110.0)).abs() < 1e-12);
        assert_eq!(c, amount_confidence(110.0, 100.0));
    }

    #[test]
    fn similarity_matches_reference_ratios() {
        assert_eq!(string_similarity("abc", "abc"), 1.0);
        assert_eq!(string_similarity("", "abc"), 0.0);
        assert!((string_similarity("5600025054", "5600025045") - 0.9).abs() < 1e-12);
        assert!((string_similarity("5600025054", "5600025099") - 0.8).abs() < 1e-12);
        assert!((string_similarity("5600025054", "4400011111") - 0.3).abs() < 1e-12);
        assert!((string_similarity("abcd", "bcde") - 0.75).abs() < 1e-12);
        assert!((string_similarity("Randstad", "RANDSTAD SAS") - 0.8).abs() < 1e-12);
    }
}
