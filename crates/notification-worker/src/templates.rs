//! 模板渲染
//!
//! 对 subject/content 中的 `{variableName}` 占位符做字面替换：
//! 变量表里没有对应键的占位符原样保留，不报错、不转义。

use std::collections::HashMap;

/// 渲染模板文本
pub fn render(template: &str, variables: &HashMap<String, String>) -> String {
    let mut rendered = template.to_string();
    for (key, value) in variables {
        rendered = rendered.replace(&format!("{{{key}}}"), value);
    }
    rendered
}
