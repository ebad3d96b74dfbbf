// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Joint hierarchy used by the animation encoder.
//!
//! The skeleton is a flat arena of [`JointNode`]s where each node refers to its
//! parent by index. [`STANDARD_SKELETON`] is the process-wide definition; it is
//! a `static` so every request encodes against the exact same tree.

use std::collections::HashSet;
use std::fmt;

use crate::error::{PipelineError, Result};

/// One animated degree of freedom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Translation along X.
    Xposition,
    /// Translation along Y.
    Yposition,
    /// Translation along Z.
    Zposition,
    /// Rotation about X.
    Xrotation,
    /// Rotation about Y.
    Yrotation,
    /// Rotation about Z.
    Zrotation,
}

impl Channel {
    /// Name used in the `CHANNELS` line of the hierarchy block.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Xposition => "Xposition",
            Self::Yposition => "Yposition",
            Self::Zposition => "Zposition",
            Self::Xrotation => "Xrotation",
            Self::Yrotation => "Yrotation",
            Self::Zrotation => "Zrotation",
        }
    }

    /// Whether this is a translation channel.
    #[must_use]
    pub const fn is_position(&self) -> bool {
        matches!(self, Self::Xposition | Self::Yposition | Self::Zposition)
    }

    /// Axis index (0 = X, 1 = Y, 2 = Z).
    #[must_use]
    pub const fn axis(&self) -> usize {
        match self {
            Self::Xposition | Self::Xrotation => 0,
            Self::Yposition | Self::Yrotation => 1,
            Self::Zposition | Self::Zrotation => 2,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Channel layout of the root joint: translation then rotation.
pub const ROOT_CHANNELS: [Channel; 6] = [
    Channel::Xposition,
    Channel::Yposition,
    Channel::Zposition,
    Channel::Zrotation,
    Channel::Xrotation,
    Channel::Yrotation,
];

/// Channel layout of every other joint.
pub const JOINT_CHANNELS: [Channel; 3] = [Channel::Zrotation, Channel::Xrotation, Channel::Yrotation];

/// A joint of the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointNode {
    /// Joint name, unique within the skeleton.
    pub name: &'static str,
    /// Index of the parent joint, `None` for the root.
    pub parent: Option<usize>,
    /// Offset from the parent in animation-space units.
    pub offset: [f64; 3],
    /// Declared channels, in output order.
    pub channels: &'static [Channel],
}

impl JointNode {
    const fn root(name: &'static str) -> Self {
        Self {
            name,
            parent: None,
            offset: [0.0, 0.0, 0.0],
            channels: &ROOT_CHANNELS,
        }
    }

    const fn child(name: &'static str, parent: usize, offset: [f64; 3]) -> Self {
        Self {
            name,
            parent: Some(parent),
            offset,
            channels: &JOINT_CHANNELS,
        }
    }
}

/// A fixed joint hierarchy plus the landmark mapping that drives it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkeletonDefinition {
    /// Joints in arena order; index 0 is the root.
    pub joints: &'static [JointNode],
    /// Landmark id whose position drives the root translation.
    pub root_landmark: u32,
    /// Factor converting normalized landmark coordinates into offset units.
    pub translation_scale: f64,
}

/// The 10-joint hierarchy every animation is encoded against.
pub static STANDARD_SKELETON: SkeletonDefinition = SkeletonDefinition {
    joints: &[
        JointNode::root("Hips"),
        JointNode::child("Spine", 0, [0.0, 10.0, 0.0]),
        JointNode::child("Neck", 1, [0.0, 10.0, 0.0]),
        JointNode::child("Head", 2, [0.0, 10.0, 0.0]),
        JointNode::child("LeftUpperArm", 1, [-10.0, 10.0, 0.0]),
        JointNode::child("LeftLowerArm", 4, [-10.0, 0.0, 0.0]),
        JointNode::child("RightUpperArm", 1, [10.0, 10.0, 0.0]),
        JointNode::child("RightLowerArm", 6, [10.0, 0.0, 0.0]),
        JointNode::child("LeftUpperLeg", 1, [-5.0, -10.0, 0.0]),
        JointNode::child("RightUpperLeg", 1, [5.0, -10.0, 0.0]),
    ],
    root_landmark: 0,
    translation_scale: 100.0,
};

impl SkeletonDefinition {
    /// Number of joints.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.joints.len()
    }

    /// Whether the skeleton has no joints.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// Sum of declared channels over all joints.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.joints.iter().map(|j| j.channels.len()).sum()
    }

    /// Indices of the direct children of `index`, in arena order.
    pub fn children(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.joints
            .iter()
            .enumerate()
            .filter(move |(_, j)| j.parent == Some(index))
            .map(|(i, _)| i)
    }

    /// Depth-first, parent-before-children traversal of the joint indices.
    #[must_use]
    pub fn traversal_order(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.joints.len());
        if self.joints.is_empty() {
            return order;
        }
        let mut stack = vec![0];
        while let Some(index) = stack.pop() {
            order.push(index);
            let children: Vec<usize> = self.children(index).collect();
            stack.extend(children.into_iter().rev());
        }
        order
    }

    /// Check the structural invariants of the hierarchy.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfiguration`] if the skeleton is empty,
    /// does not have exactly one root at index 0, has a parent that does not
    /// precede its child, repeats a joint name, declares a channel layout other
    /// than 6 channels for the root and 3 rotations elsewhere, or has a
    /// non-finite offset or scale.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(PipelineError::InvalidConfiguration(msg));

        let Some(root) = self.joints.first() else {
            return invalid("skeleton has no joints".to_string());
        };
        if root.parent.is_some() {
            return invalid(format!("first joint '{}' must be the root", root.name));
        }
        if !self.translation_scale.is_finite() {
            return invalid("translation scale must be finite".to_string());
        }

        let mut names = HashSet::with_capacity(self.joints.len());
        for (index, joint) in self.joints.iter().enumerate() {
            if joint.name.is_empty() || joint.name.contains(char::is_whitespace) {
                return invalid(format!("joint {index} has an invalid name"));
            }
            if !names.insert(joint.name) {
                return invalid(format!("joint name '{}' is repeated", joint.name));
            }
            if joint.offset.iter().any(|v| !v.is_finite()) {
                return invalid(format!("joint '{}' has a non-finite offset", joint.name));
            }

            match joint.parent {
                None if index != 0 => {
                    return invalid(format!("joint '{}' is a second root", joint.name));
                }
                None => {
                    let positions = joint.channels.iter().filter(|c| c.is_position()).count();
                    if joint.channels.len() != 6 || positions != 3 {
                        return invalid(format!(
                            "root '{}' must declare 3 position and 3 rotation channels",
                            joint.name
                        ));
                    }
                }
                Some(parent) => {
                    if parent >= index {
                        return invalid(format!(
                            "joint '{}' must come after its parent",
                            joint.name
                        ));
                    }
                    if joint.channels.len() != 3 || joint.channels.iter().any(Channel::is_position) {
                        return invalid(format!(
                            "joint '{}' must declare exactly 3 rotation channels",
                            joint.name
                        ));
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_skeleton_is_valid() {
        assert!(STANDARD_SKELETON.validate().is_ok());
        assert_eq!(STANDARD_SKELETON.len(), 10);
        assert_eq!(STANDARD_SKELETON.channel_count(), 33);
    }

    #[test]
    fn test_traversal_is_depth_first() {
        let names: Vec<&str> = STANDARD_SKELETON
            .traversal_order()
            .into_iter()
            .map(|i| STANDARD_SKELETON.joints[i].name)
            .collect();
        assert_eq!(
            names,
            [
                "Hips",
                "Spine",
                "Neck",
                "Head",
                "LeftUpperArm",
                "LeftLowerArm",
                "RightUpperArm",
                "RightLowerArm",
                "LeftUpperLeg",
                "RightUpperLeg",
            ]
        );
    }

    #[test]
    fn test_children() {
        let spine_children: Vec<usize> = STANDARD_SKELETON.children(1).collect();
        assert_eq!(spine_children, vec![2, 4, 6, 8, 9]);
        assert_eq!(STANDARD_SKELETON.children(3).count(), 0);
    }

    #[test]
    fn test_empty_skeleton_rejected() {
        let skeleton = SkeletonDefinition {
            joints: &[],
            root_landmark: 0,
            translation_scale: 100.0,
        };
        assert!(matches!(
            skeleton.validate(),
            Err(PipelineError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_two_roots_rejected() {
        const JOINTS: &[JointNode] = &[JointNode::root("Hips"), JointNode::root("Other")];
        let skeleton = SkeletonDefinition {
            joints: JOINTS,
            root_landmark: 0,
            translation_scale: 100.0,
        };
        assert!(skeleton.validate().is_err());
    }

    #[test]
    fn test_forward_parent_rejected() {
        const JOINTS: &[JointNode] = &[
            JointNode::root("Hips"),
            JointNode::child("Spine", 2, [0.0, 10.0, 0.0]),
            JointNode::child("Neck", 1, [0.0, 10.0, 0.0]),
        ];
        let skeleton = SkeletonDefinition {
            joints: JOINTS,
            root_landmark: 0,
            translation_scale: 100.0,
        };
        assert!(skeleton.validate().is_err());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        const JOINTS: &[JointNode] = &[
            JointNode::root("Hips"),
            JointNode::child("Spine", 0, [0.0, 10.0, 0.0]),
            JointNode::child("Spine", 1, [0.0, 10.0, 0.0]),
        ];
        let skeleton = SkeletonDefinition {
            joints: JOINTS,
            root_landmark: 0,
            translation_scale: 100.0,
        };
        assert!(skeleton.validate().is_err());
    }

    #[test]
    fn test_bad_channel_layout_rejected() {
        const JOINTS: &[JointNode] = &[
            JointNode::root("Hips"),
            JointNode {
                name: "Spine",
                parent: Some(0),
                offset: [0.0, 10.0, 0.0],
                channels: &ROOT_CHANNELS,
            },
        ];
        let skeleton = SkeletonDefinition {
            joints: JOINTS,
            root_landmark: 0,
            translation_scale: 100.0,
        };
        assert!(skeleton.validate().is_err());
    }
}
