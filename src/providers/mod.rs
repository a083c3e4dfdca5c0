pub mod dingtalk;
pub mod juhe;
pub mod newsdata;
pub mod open_meteo;
pub mod util;
