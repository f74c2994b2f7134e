// 该文件是 Zhebi （遮蔽） 项目的一部分。
// src/store/imgbb.rs - imgbb 图床客户端
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

use std::time::Duration;

use reqwest::blocking::{
  Client,
  multipart::{Form, Part},
};
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::{
  config::ImgbbConfig,
  store::{ObjectStore, UploadError},
};

const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct UploadResponse {
  data: UploadData,
}

#[derive(Debug, Deserialize)]
struct UploadData {
  url: Url,
}

fn parse_upload_response(body: &str) -> Result<Url, UploadError> {
  serde_json::from_str::<UploadResponse>(body)
    .map(|response| response.data.url)
    .map_err(|e| UploadError::MalformedResponse(e.to_string()))
}

pub struct ImgbbStore {
  client: Client,
  config: ImgbbConfig,
}

impl ImgbbStore {
  pub fn new(config: ImgbbConfig) -> Result<Self, reqwest::Error> {
    let client = Client::builder().timeout(HTTP_TIMEOUT).build()?;
    info!("图床已配置: endpoint={}", config.endpoint);
    Ok(Self { client, config })
  }
}

impl ObjectStore for ImgbbStore {
  fn publish(&self, bytes: &[u8], file_name: &str) -> Result<Url, UploadError> {
    debug!("上传 {} ({} 字节)", file_name, bytes.len());
    let part = Part::bytes(bytes.to_vec()).file_name(file_name.to_string());
    let form = Form::new().part("image", part);

    let response = self
      .client
      .post(self.config.endpoint.clone())
      .query(&[("key", self.config.api_key.as_str())])
      .multipart(form)
      .send()
      .map_err(|e| UploadError::Unreachable(e.to_string()))?;

    let status = response.status();
    let text = response
      .text()
      .map_err(|e| UploadError::Unreachable(e.to_string()))?;
    if !status.is_success() {
      return Err(UploadError::Rejected {
        status: status.as_u16(),
        message: text,
      });
    }

    let url = parse_upload_response(&text)?;
    info!("已上传到图床: {}", url);
    Ok(url)
  }
}
