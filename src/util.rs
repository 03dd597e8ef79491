// 文本清理工具

/// 去掉单元格文本中的排版残留：首尾空白、不间断空格、换行与连续空格
pub fn clean_text(raw: &str) -> String {
    raw.split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// 规范化股票代码: "B.V.L" -> "BVL", "bvl" -> "BVL"
///
/// 只保留字母和数字并转为大写，因此结果再规范化一次不会改变。
pub fn normalize_symbol(code: &str) -> String {
    code.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_uppercase)
        .collect()
}
