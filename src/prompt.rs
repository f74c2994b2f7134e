// 该文件是 Zhebi （遮蔽） 项目的一部分。
// src/prompt.rs - 检测提示词扩展
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

/// 改写模板，`{}` 处替换为原始描述
const PARAPHRASES: [(&str, &str); 4] = [
  ("a photo of ", ""),
  ("", " on the left"),
  ("", " close-up"),
  ("", " object"),
];

/// 将简短的目标描述扩展为多短语查询，以提高检测召回率
pub fn expand(prompt: &str) -> String {
  let mut query = String::from(prompt);
  for (prefix, suffix) in PARAPHRASES {
    query.push_str(", ");
    query.push_str(prefix);
    query.push_str(prompt);
    query.push_str(suffix);
  }
  query
}
