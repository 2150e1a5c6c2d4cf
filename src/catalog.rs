//! Built-in random image and video sources.

use serde::Deserialize;

use crate::error::ConfigError;
use crate::types::{MediaKind, SourceDescriptor};

const BUILTIN: &str = r#"
[[sources]]
id = "xximg_wallpaper"
name = "小小_4k壁纸"
endpoint = "https://v2.api-m.com/api/random4kPic?type=wallpaper"
mode = "structured"
path = "data"

[[sources]]
id = "xximg_acg"
name = "小小_4kACG"
endpoint = "https://v2.api-m.com/api/random4kPic?type=acg"
mode = "structured"
path = "data"

[[sources]]
id = "xximg_wallpaper2"
name = "小小_壁纸"
endpoint = "https://v2.api-m.com/api/wallpaper"
mode = "structured"
path = "data"

[[sources]]
id = "xximg_meinvpc"
name = "小小_美女"
endpoint = "https://v2.api-m.com/api/meinvpic"
mode = "structured"
path = "data"

[[sources]]
id = "xximg_hs"
name = "小小_hs"
endpoint = "https://v2.api-m.com/api/heisi"
mode = "structured"
path = "data"

[[sources]]
id = "wm_bing"
name = "维梦_bing"
endpoint = "https://mirror.20200511.xyz/https://api.52vmy.cn/api/wl/word/bing/tu"
mode = "structured"
path = "data.pc_url"

[[sources]]
id = "wm_4kphone"
name = "维梦_4k手机壁纸"
endpoint = "https://mirror.20200511.xyz/https://api.52vmy.cn/api/img/tu/mo"
mode = "structured"
path = "url"

[[sources]]
id = "wm_girl"
name = "维梦_girl"
endpoint = "https://mirror.20200511.xyz/https://api.52vmy.cn/api/img/tu/girl"
mode = "structured"
path = "url"

[[sources]]
id = "wm_dongman"
name = "维梦_动漫"
endpoint = "https://mirror.20200511.xyz/https://api.52vmy.cn/api/img/tu/man"
mode = "structured"
path = "url"

[[sources]]
id = "wm_4kpc"
name = "维梦_4k壁纸"
endpoint = "https://mirror.20200511.xyz/https://api.52vmy.cn/api/img/tu/pc"
mode = "structured"
path = "url"

[[sources]]
id = "wm_fengjing"
name = "维梦_风景"
endpoint = "https://mirror.20200511.xyz/https://api.52vmy.cn/api/img/tu/view"
mode = "structured"
path = "url"

[[sources]]
id = "wm_game"
name = "维梦_游戏"
endpoint = "https://mirror.20200511.xyz/https://api.52vmy.cn/api/img/tu/game"
mode = "structured"
path = "url"

[[sources]]
id = "wm_mx"
name = "维梦_明星"
endpoint = "https://mirror.20200511.xyz/https://api.52vmy.cn/api/img/tu/idol"
mode = "structured"
path = "url"

[[sources]]
id = "wm_girls"
name = "维梦_girl"
kind = "video"
endpoint = "https://mirror.20200511.xyz/https://api.52vmy.cn/api/video/girl"
mode = "structured"
path = "data.video"

[[sources]]
id = "wm_tianmei"
name = "维梦_tm"
kind = "video"
endpoint = "https://mirror.20200511.xyz/https://api.52vmy.cn/api/video/tianmei"
mode = "structured"
path = "data.video"

[[sources]]
id = "wm_yule"
name = "维梦_娱乐"
kind = "video"
endpoint = "https://mirror.20200511.xyz/https://api.52vmy.cn/api/video/yule"
mode = "structured"
path = "data.video"

[[sources]]
id = "yj_girls_1"
name = "遇见API_1"
kind = "video"
endpoint = "https://mirror.20200511.xyz/https://api.yujn.cn/api/zzxjj.php"
mode = "raw"

[[sources]]
id = "yj_girls_2"
name = "遇见API_2"
kind = "video"
endpoint = "https://mirror.20200511.xyz/https://api.yujn.cn/api/xjj.php"
mode = "raw"

[[sources]]
id = "yj_girls_3"
name = "遇见API_3"
kind = "video"
endpoint = "https://mirror.20200511.xyz/https://api.yujn.cn/api/nvda.php"
mode = "raw"

[[sources]]
id = "xx_girls"
name = "小小API"
kind = "video"
endpoint = "https://v2.api-m.com/api/meinv"
mode = "structured"
path = "data"
"#;

#[derive(Deserialize)]
pub(crate) struct SourceList {
    #[serde(default)]
    pub(crate) sources: Vec<SourceDescriptor>,
}

/// All built-in sources, images first, in display order.
pub fn builtin() -> Result<Vec<SourceDescriptor>, ConfigError> {
    let list: SourceList = toml::from_str(BUILTIN)?;
    Ok(list.sources)
}

pub fn builtin_of_kind(kind: MediaKind) -> Result<Vec<SourceDescriptor>, ConfigError> {
    Ok(builtin()?.into_iter().filter(|s| s.kind == kind).collect())
}
