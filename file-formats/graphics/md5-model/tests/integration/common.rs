//! Shared fixtures: a three-joint guard model and generated clips

use std::fmt::Write;
use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

/// origin -> spine -> arm, with the arm turned -90 degrees about z.
/// "body" is a quad on origin and spine, "hand" a triangle on the arm with
/// one vertex shared with the spine.
pub const GUARD_MESH: &str = r#"MD5Version 10
commandline "mesh models/guard/guard.mb -game example"

numJoints 3
numMeshes 2

joints {
	"origin"	-1 ( 0 0 0 ) ( 0 0 0 )		//
	"spine"	0 ( 0 0 2 ) ( 0 0 0 )		// origin
	"arm"	1 ( 1 0 2 ) ( 0 0 0.70710677 )		// spine
}

mesh {
	// meshes: body
	shader "models/guard/body"

	numverts 4
	vert 0 ( 0 0 ) 0 1
	vert 1 ( 1 0 ) 1 1
	vert 2 ( 1 1 ) 2 1
	vert 3 ( 0 1 ) 3 1

	numtris 2
	tri 0 0 2 1
	tri 1 0 3 2

	numweights 4
	weight 0 0 1 ( -1 0 0 )
	weight 1 0 1 ( 1 0 0 )
	weight 2 1 1 ( 1 0 1 )
	weight 3 1 1 ( -1 0 1 )
}

mesh {
	// meshes: hand
	shader "models/guard/hand"

	numverts 3
	vert 0 ( 0 0 ) 0 1
	vert 1 ( 1 0 ) 1 1
	vert 2 ( 0.5 1 ) 2 2

	numtris 1
	tri 0 0 1 2

	numweights 4
	weight 0 2 1 ( 0 0 0 )
	weight 1 2 1 ( 0.5 0 0 )
	weight 2 2 0.5 ( 0 0 0.5 )
	weight 3 1 0.5 ( 1 0 0.5 )
}
"#;

/// Clip for the guard skeleton moving the arm along the spine's x axis,
/// one frame per value
pub fn arm_clip(arm_x: &[f32], frame_rate: f32) -> String {
    let mut text = String::new();
    writeln!(text, "MD5Version 10").unwrap();
    writeln!(text, "commandline \"\"\n").unwrap();
    writeln!(text, "numFrames {}", arm_x.len()).unwrap();
    writeln!(text, "numJoints 3").unwrap();
    writeln!(text, "frameRate {frame_rate}").unwrap();
    writeln!(text, "numAnimatedComponents 1\n").unwrap();

    text.push_str(
        "hierarchy {\n\
         \t\"origin\"\t-1 0 0\t//\n\
         \t\"spine\"\t0 0 0\t// origin\n\
         \t\"arm\"\t1 1 0\t// spine ( Tx )\n\
         }\n\n",
    );

    text.push_str("bounds {\n");
    for x in arm_x {
        writeln!(text, "\t( -1 -1 0 ) ( {} 1 3 )", x + 0.5).unwrap();
    }
    text.push_str("}\n\n");

    text.push_str(
        "baseframe {\n\
         \t( 0 0 0 ) ( 0 0 0 )\n\
         \t( 0 0 2 ) ( 0 0 0 )\n\
         \t( 1 0 0 ) ( 0 0 0.70710677 )\n\
         }\n\n",
    );

    for (index, x) in arm_x.iter().enumerate() {
        writeln!(text, "frame {index} {{\n\t{x}\n}}\n").unwrap();
    }
    text
}

/// Write the guard model and the given clips into a temporary directory
pub fn guard_on_disk(clips: &[(&str, &[f32])]) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let mesh_path = dir.path().join("guard.md5mesh");
    fs::write(&mesh_path, GUARD_MESH).unwrap();

    for (name, arm_x) in clips {
        fs::write(dir.path().join(format!("{name}.md5anim")), arm_clip(arm_x, 2.0)).unwrap();
    }

    (dir, mesh_path)
}
