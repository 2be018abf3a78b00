//! 相对路径以配置文件所在目录为基准

use std::path::{Path, PathBuf};

use contracts::{PipelineBlueprint, SinkKind, SourceConfig};

/// 把文件数据源、文件 sink 与查询文件的相对路径改写为基于 `base_dir`
pub fn anchor_relative_paths(blueprint: &mut PipelineBlueprint, base_dir: &Path) {
    if let SourceConfig::File(file) = &mut blueprint.source {
        anchor(&mut file.path, base_dir);
    }
    if let Some(query_file) = &mut blueprint.query.file {
        anchor(query_file, base_dir);
    }
    for sink in &mut blueprint.sinks {
        if let SinkKind::File(file) = &mut sink.kind {
            anchor(&mut file.path, base_dir);
        }
    }
}

fn anchor(path: &mut PathBuf, base_dir: &Path) {
    if path.is_relative() {
        *path = base_dir.join(&*path);
    }
}
