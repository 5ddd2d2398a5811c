//! 通用工具函数

/// 计算百分比，分母为0时返回0（不会产生NaN）
pub fn percent(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    count as f64 / total as f64 * 100.0
}

/// 报告下载文件名
pub fn report_filename(exam_id: i64) -> String {
    format!("qc_report_exam_{exam_id}.pdf")
}

/// 按字符数截断文本，超出部分以省略号结尾
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_zero_total() {
        assert_eq!(percent(0, 0), 0.0);
        assert_eq!(percent(5, 0), 0.0);
        assert_eq!(percent(1, 4), 25.0);
    }

    #[test]
    fn test_report_filename() {
        assert_eq!(report_filename(42), "qc_report_exam_42.pdf");
    }

    #[test]
    fn test_truncate_chars_counts_characters() {
        assert_eq!(truncate_chars("Қазақстан", 20), "Қазақстан");
        assert_eq!(truncate_chars("Қазақстан", 4), "Қаз…");
    }
}
