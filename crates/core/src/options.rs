//! 多值配置选项
//!
//! Worker初始化时接收的配置选项由两部分合并而来：
//! - 上下文的静态配置（来自配置文件）
//! - 控制请求中携带的请求参数
//!
//! 每个选项名对应一个有序的字符串列表，以支持同名参数重复出现的情况。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// 选项名到有序值列表的映射
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigurationOptions(HashMap<String, Vec<String>>);

impl ConfigurationOptions {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    /// 设置选项的全部取值，覆盖已有取值
    pub fn insert(&mut self, key: impl Into<String>, values: Vec<String>) {
        self.0.insert(key.into(), values);
    }

    /// 在选项末尾追加一个取值
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.entry(key.into()).or_default().push(value.into());
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.0.get(key).map(Vec::as_slice)
    }

    /// 获取选项的第一个取值
    pub fn first(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }

    /// 用`overrides`中的选项覆盖当前选项，返回合并后的新选项集
    ///
    /// 同名选项以`overrides`为准，新选项名直接加入结果。
    pub fn merged_with(&self, overrides: &ConfigurationOptions) -> ConfigurationOptions {
        let mut merged = self.0.clone();
        for (key, values) in &overrides.0 {
            merged.insert(key.clone(), values.clone());
        }
        Self(merged)
    }
}

impl From<HashMap<String, Vec<String>>> for ConfigurationOptions {
    fn from(values: HashMap<String, Vec<String>>) -> Self {
        Self(values)
    }
}

impl FromIterator<(String, Vec<String>)> for ConfigurationOptions {
    fn from_iter<I: IntoIterator<Item = (String, Vec<String>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
