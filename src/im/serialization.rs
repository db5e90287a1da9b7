//! serde 辅助函数：兼容服务器返回的 null 字段

use serde::{Deserialize, Deserializer};

/// 反序列化数组字段，null 或缺失时返回空数组
pub fn deserialize_vec_or_null<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let opt = Option::<Vec<T>>::deserialize(deserializer)?;
    Ok(opt.unwrap_or_default())
}

/// 反序列化字符串字段，null 时返回空字符串
pub fn deserialize_string_or_null<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Holder {
        #[serde(default, deserialize_with = "deserialize_vec_or_null")]
        items: Vec<u32>,
        #[serde(default, deserialize_with = "deserialize_string_or_null")]
        name: String,
    }

    #[test]
    fn null_fields_become_empty() {
        let h: Holder = serde_json::from_str(r#"{"items":null,"name":null}"#).unwrap();
        assert!(h.items.is_empty());
        assert!(h.name.is_empty());

        let h: Holder = serde_json::from_str(r#"{}"#).unwrap();
        assert!(h.items.is_empty());

        let h: Holder = serde_json::from_str(r#"{"items":[1,2],"name":"x"}"#).unwrap();
        assert_eq!(h.items, vec![1, 2]);
        assert_eq!(h.name, "x");
    }
}
