use crate::config::UpstreamHeaders;
use crate::error::{Error, Result};
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, ORIGIN, REFERER, USER_AGENT,
};

impl UpstreamHeaders {
    /// 构造发往上游的请求头
    ///
    /// 所有伪装头都只在这里组装，上游调整检测规则时只需修改配置。
    pub fn to_header_map(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(REFERER, header_value("referer", &self.referer)?);
        headers.insert(ORIGIN, header_value("origin", &self.origin)?);
        headers.insert(USER_AGENT, header_value("user_agent", &self.user_agent)?);

        let counter = HeaderName::from_bytes(self.counter_header.as_bytes()).map_err(|_| {
            Error::Config(format!("Invalid counter header name: {}", self.counter_header))
        })?;
        headers.insert(counter, header_value("counter_value", &self.counter_value)?);

        Ok(headers)
    }
}

fn header_value(field: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| Error::Config(format!("Invalid value for upstream header {}", field)))
}
